//! Schema registry client.
//!
//! Per-request, TLS-authenticated connection to the schema registry of one
//! environment. Constructed only when schema-encoded topics are requested;
//! the decoder binds one schema per topic per request through it.

use apache_avro::Schema;
use kafkasift_common::{Error, Result};
use kafkasift_config::Environment;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::tls::TlsMaterial;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one environment's registry.
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
}

/// Registry response for a subject version.
#[derive(Debug, Deserialize)]
pub struct RegisteredSchema {
    pub id: i64,
    pub version: i32,
    pub schema: String,
}

impl RegistryClient {
    /// Build a client authenticated with the provisioned key material and
    /// the environment's CA bundle.
    pub fn connect(env: &Environment, tls: &TlsMaterial) -> Result<Self> {
        let identity = reqwest::Identity::from_pem(tls.pem_bytes())
            .map_err(|e| Error::Credential(format!("registry client identity: {e}")))?;
        let ca_pem = std::fs::read(&env.tls.ca_location).map_err(|e| {
            Error::Credential(format!(
                "cannot read CA bundle {}: {e}",
                env.tls.ca_location.display()
            ))
        })?;
        let ca = reqwest::Certificate::from_pem(&ca_pem)
            .map_err(|e| Error::Credential(format!("malformed CA bundle: {e}")))?;

        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .add_root_certificate(ca)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Connection(format!("error initializing registry client: {e}")))?;

        Ok(Self {
            http,
            base_url: env.schema_registry_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch and compile the latest schema registered under a subject.
    pub async fn latest_schema(&self, subject: &str) -> Result<Schema> {
        let url = subject_url(&self.base_url, subject);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Connection(format!("registry request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::SchemaNotConfigured(format!(
                "registry returned {} for subject {subject}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| Error::Connection(format!("registry response read failed: {e}")))?;
        let registered = parse_schema_response(&body)?;
        debug!(subject, id = registered.id, version = registered.version, "fetched schema");
        compile_schema(subject, &registered.schema)
    }
}

fn subject_url(base_url: &str, subject: &str) -> String {
    format!("{base_url}/subjects/{subject}/versions/latest")
}

fn parse_schema_response(body: &str) -> Result<RegisteredSchema> {
    serde_json::from_str(body)
        .map_err(|e| Error::Connection(format!("unexpected registry response: {e}")))
}

fn compile_schema(subject: &str, raw: &str) -> Result<Schema> {
    Schema::parse_str(raw).map_err(|e| {
        Error::SchemaNotConfigured(format!("schema for subject {subject} does not compile: {e}"))
    })
}
