//! Common types used throughout kafkasift.

use serde::{Deserialize, Serialize};

/// Offset within a partition.
pub type Offset = i64;

/// Timestamp in milliseconds since epoch.
pub type Timestamp = i64;

/// Payload encoding of a topic's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// Plain structured payloads (JSON values)
    Json,
    /// Schema-encoded payloads (Avro, schema fetched from a registry)
    Avro,
}

impl PayloadKind {
    /// Response-key prefix for this payload kind.
    pub fn response_prefix(&self) -> &'static str {
        match self {
            PayloadKind::Json => "JSON_TOPIC_",
            PayloadKind::Avro => "AVRO_TOPIC_",
        }
    }
}
