//! Request and response model for one search transaction.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use kafkasift_common::{DateTime, Error, Result, Utc};
use serde::{Deserialize, Serialize};

/// Response key for request-level failures (e.g. a broker close error).
pub const RESPONSE_ERROR_KEY: &str = "ERROR";

/// Canonical parameters of one search, produced by the resolver and owned
/// exclusively by the in-flight request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Lower-cased substring to look for in decoded records.
    pub search_string: String,
    /// Connection profile name, lower-cased.
    pub environment: String,
    /// Attach decoded key and transport attributes to each match.
    pub include_metadata: bool,
    /// Insert the 3-line visual separator block between matches.
    pub include_delimiter: bool,
    /// Parsed and validated but applied nowhere; kept until product
    /// intent for timestamp filtering is settled.
    pub not_before: Option<DateTime<Utc>>,
    /// Unused hint carried through from the request.
    pub search_count: Option<u64>,
    /// Topics with plain JSON payloads.
    pub json_topics: BTreeSet<String>,
    /// Topics with schema-encoded payloads.
    pub avro_topics: BTreeSet<String>,
}

impl SearchRequest {
    /// The invariant every request must satisfy before any broker
    /// connection is opened.
    pub fn validate(&self) -> Result<()> {
        if self.search_string.is_empty() {
            return Err(Error::InvalidRequest(
                "required param searchParam not found".to_string(),
            ));
        }
        if self.json_topics.is_empty() && self.avro_topics.is_empty() {
            return Err(Error::InvalidRequest(
                "no valid topics selected for search".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result slot for a single topic: either the ordered matches
/// (most-recently-scanned first) or an error description for that topic
/// alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TopicOutcome {
    Matches(Vec<serde_json::Value>),
    Failed(String),
}

/// Aggregated result: namespaced topic keys mapped to their outcome, plus
/// an optional top-level `ERROR` entry.
pub type SearchResponse = BTreeMap<String, TopicOutcome>;
