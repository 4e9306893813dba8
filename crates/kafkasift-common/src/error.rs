//! Error types for kafkasift.

use thiserror::Error;

/// Result type alias for kafkasift operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kafkasift.
///
/// Request-level variants (`InvalidRequest`, `Credential`, `Connection`,
/// `Configuration`) abort the whole search; `TopicAccess` and
/// `SchemaNotConfigured` are fatal for a single topic only and are
/// downgraded to a result-slot string by the orchestrator. `Decode` is a
/// per-message condition and never aborts a scan.
#[derive(Error, Debug)]
pub enum Error {
    /// Request rejected before any I/O (missing search string, no topics,
    /// unparseable timestamp)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Certificate container / key material failures
    #[error("Credential error: {0}")]
    Credential(String),

    /// Broker or registry unreachable, metadata fetch timeout
    #[error("Connection error: {0}")]
    Connection(String),

    /// Requested topic not visible to the connection
    #[error("Topic access error: {0}")]
    TopicAccess(String),

    /// Schema-encoded topic without a configured schema reference
    #[error("Schema not configured: {0}")]
    SchemaNotConfigured(String),

    /// Configuration errors (missing or malformed keys)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Per-message payload decode failures
    #[error("Decode error: {0}")]
    Decode(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
