//! Search engine for ad-hoc, case-insensitive substring searches across
//! Kafka topics.
//!
//! A request names one or more topics (plain JSON payloads or
//! schema-encoded Avro payloads) and a search string; the engine opens a
//! mutual-TLS connection to the broker of the requested environment, scans
//! every partition of every requested topic to its end, decodes each
//! message according to its declared encoding, and returns the matching
//! records per topic. Per-topic failures are isolated: a failed topic
//! occupies its result slot with an error string while its siblings still
//! return matches.

pub mod audit;
pub mod broker;
pub mod decoder;
pub mod orchestrator;
pub mod registry;
pub mod resolver;
pub mod scanner;
pub mod tls;
pub mod types;

pub use audit::{AuditEntry, AuditSink, TracingAudit};
pub use orchestrator::SearchEngine;
pub use resolver::{resolve, RawRequest};
pub use types::{SearchRequest, SearchResponse, TopicOutcome};
