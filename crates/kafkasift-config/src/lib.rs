//! Configuration surface for kafkasift.
//!
//! Connection profiles and topic tables are loaded from YAML once at
//! startup and treated as read-only for the process lifetime. Every
//! request-scoped component takes the loaded objects by reference; nothing
//! mutates them after load.

pub mod loader;
pub mod types;

pub use types::{ConsumerTuning, Environment, Settings, TlsSettings, TopicCatalog};
