//! Configuration types.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use kafkasift_common::{Error, Result};
use serde::Deserialize;

/// Top-level connection settings, one per deployment.
///
/// Loaded once at startup; immutable afterwards. Environments are looked
/// up by name per request.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Environment used when a request does not name one.
    pub default_environment: String,

    /// Consumer tuning knobs shared by all environments.
    pub consumer: ConsumerTuning,

    /// Named connection profiles.
    pub environments: HashMap<String, Environment>,

    /// Whether configured topic names found as keys or values of a raw
    /// request are added to the search sets (deprecated convenience
    /// matching, kept for compatibility).
    #[serde(default = "default_true")]
    pub legacy_topic_matching: bool,

    /// Upper bound on one request's total scan time, in seconds. Scans
    /// still in flight when it elapses fail with a connection error
    /// instead of pinning the request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Settings {
    /// Look up a connection profile by name.
    pub fn environment(&self, name: &str) -> Result<&Environment> {
        self.environments.get(name).ok_or_else(|| {
            Error::Configuration(format!("unknown environment: {name}"))
        })
    }

    /// Checks the constraints serde cannot express. Runs at startup so
    /// malformed configuration fails before any connection attempt.
    pub fn validate(&self) -> Result<()> {
        if !self.environments.contains_key(&self.default_environment) {
            return Err(Error::Configuration(format!(
                "default_environment '{}' has no matching entry under environments",
                self.default_environment
            )));
        }
        for (name, env) in &self.environments {
            if env.brokers.is_empty() {
                return Err(Error::Configuration(format!(
                    "environments.{name}.brokers must not be empty"
                )));
            }
            if env.schema_registry_url.is_empty() {
                return Err(Error::Configuration(format!(
                    "environments.{name}.schema_registry_url must not be empty"
                )));
            }
        }
        if self.consumer.group_id.is_empty() {
            return Err(Error::Configuration(
                "consumer.group_id must not be empty".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Configuration(
                "request_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Consumer tuning knobs passed through to the broker client.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsumerTuning {
    pub group_id: String,
    pub client_id: String,
    #[serde(default)]
    pub enable_auto_commit: bool,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u32,
    /// Pinned to "earliest" by default so every scan starts at the head of
    /// each partition regardless of committed group state.
    #[serde(default = "default_offset_reset")]
    pub auto_offset_reset: String,
    #[serde(default = "default_true")]
    pub api_version_request: bool,
}

/// A named connection profile: broker addresses, registry URL and TLS
/// material locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    pub brokers: Vec<String>,
    pub schema_registry_url: String,
    pub tls: TlsSettings,
}

/// Locations and passphrase of the TLS material for one environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsSettings {
    /// PKCS#12 certificate container holding the client key and chain.
    pub pfx_file: PathBuf,
    /// Passphrase protecting the container.
    pub pfx_password: String,
    /// Client certificate in PEM form.
    pub certificate_location: PathBuf,
    /// CA bundle in PEM form, shared by broker and registry connections.
    pub ca_location: PathBuf,
}

/// Topic tables: which topics carry plain JSON payloads and which are
/// schema-encoded (with their registry subject).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicCatalog {
    /// Topics whose values are plain structured JSON.
    #[serde(default)]
    pub json_topics: HashSet<String>,
    /// Schema-encoded topics, mapped to the registry subject holding their
    /// schema. Requests for topics absent from this table fail fast
    /// without opening a decoder.
    #[serde(default)]
    pub avro_topics: HashMap<String, String>,
}

impl TopicCatalog {
    /// Whether the topic is configured as schema-encoded.
    pub fn is_avro_topic(&self, topic: &str) -> bool {
        self.avro_topics.contains_key(topic)
    }

    /// Registry subject for a schema-encoded topic, if configured.
    pub fn avro_subject(&self, topic: &str) -> Option<&str> {
        self.avro_topics.get(topic).map(String::as_str)
    }

    /// All configured topic names, both kinds. Used by the legacy
    /// key-or-value request matching pass.
    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.json_topics
            .iter()
            .map(String::as_str)
            .chain(self.avro_topics.keys().map(String::as_str))
    }
}

fn default_true() -> bool {
    true
}

fn default_session_timeout_ms() -> u32 {
    10_000
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_offset_reset() -> String {
    "earliest".to_string()
}
