//! Audit log boundary.
//!
//! The engine records every resolved request through a write-only sink;
//! the default implementation emits structured `tracing` events under the
//! `audit` target, which deployments route to their request log.

use serde::Serialize;
use tracing::info;

use crate::types::SearchRequest;

/// Serializable snapshot of a resolved request, topic sets materialized
/// as ordered sequences.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub search_string: String,
    pub environment: String,
    pub include_metadata: bool,
    pub include_delimiter: bool,
    pub not_before: Option<String>,
    pub search_count: Option<u64>,
    pub json_topics: Vec<String>,
    pub avro_topics: Vec<String>,
}

impl From<&SearchRequest> for AuditEntry {
    fn from(request: &SearchRequest) -> Self {
        Self {
            search_string: request.search_string.clone(),
            environment: request.environment.clone(),
            include_metadata: request.include_metadata,
            include_delimiter: request.include_delimiter,
            not_before: request.not_before.map(|t| t.to_rfc3339()),
            search_count: request.search_count,
            json_topics: request.json_topics.iter().cloned().collect(),
            avro_topics: request.avro_topics.iter().cloned().collect(),
        }
    }
}

/// Write-only sink for processed requests.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Default sink: one structured event per request.
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, entry: &AuditEntry) {
        let params = serde_json::to_string(entry).unwrap_or_else(|_| "{}".to_string());
        info!(target: "audit", %params, "search request");
    }
}
