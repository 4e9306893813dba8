//! Broker connection manager.
//!
//! Builds a per-request consumer from environment-scoped settings and the
//! provisioned TLS material, and probes connectivity by fetching the full
//! cluster metadata once. The metadata doubles as the topic/partition
//! table the scanner works from.

use std::sync::Arc;
use std::time::Duration;

use kafkasift_common::{Error, Result};
use kafkasift_config::{ConsumerTuning, Environment};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::metadata::Metadata;
use tracing::{debug, info, warn};

use crate::tls::TlsMaterial;

/// Bound on the initial metadata fetch; exceeding it typically means the
/// broker is unreachable.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// A per-request broker connection plus the topic metadata it could see.
///
/// Owned exclusively by one in-flight request; never pooled or shared
/// across requests.
pub struct BrokerReader {
    consumer: Arc<BaseConsumer>,
    metadata: Metadata,
}

impl BrokerReader {
    /// Open a consumer for the environment and fetch the cluster metadata.
    pub fn connect(
        env: &Environment,
        tuning: &ConsumerTuning,
        tls: &TlsMaterial,
    ) -> Result<Self> {
        let consumer: BaseConsumer = build_client_config(env, tuning, tls)
            .create()
            .map_err(|e| Error::Connection(format!("error initializing consumer: {e}")))?;

        let metadata = consumer
            .fetch_metadata(None, METADATA_TIMEOUT)
            .map_err(|e| {
                Error::Connection(format!(
                    "error retrieving list of available topics, check broker connection settings: {e}"
                ))
            })?;

        info!(
            brokers = %env.brokers.join(","),
            topics = metadata.topics().len(),
            "connected to broker"
        );
        Ok(Self {
            consumer: Arc::new(consumer),
            metadata,
        })
    }

    /// The underlying consumer, shared with the blocking scan tasks.
    pub fn consumer(&self) -> Arc<BaseConsumer> {
        Arc::clone(&self.consumer)
    }

    /// Partition ids of a topic, from the metadata fetched at connect
    /// time. A topic missing there is not visible to these credentials.
    pub fn partitions_of(&self, topic: &str) -> Result<Vec<i32>> {
        let entry = self
            .metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .ok_or_else(|| {
                Error::TopicAccess(format!(
                    "application does not have access to requested topic: {topic}"
                ))
            })?;
        let partitions: Vec<i32> = entry.partitions().iter().map(|p| p.id()).collect();
        debug!(topic, partitions = partitions.len(), "resolved partitions");
        Ok(partitions)
    }

    /// Release the partition assignment and drop the connection. Failures
    /// surface so the orchestrator can record them, without discarding
    /// already-collected results.
    pub fn close(self) -> Result<()> {
        if let Err(e) = self.consumer.unassign() {
            warn!("error releasing partition assignment: {e}");
            return Err(Error::Connection(format!(
                "error closing connection to broker: {e}"
            )));
        }
        Ok(())
    }
}

fn build_client_config(
    env: &Environment,
    tuning: &ConsumerTuning,
    tls: &TlsMaterial,
) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", env.brokers.join(","))
        .set("group.id", &tuning.group_id)
        .set("client.id", &tuning.client_id)
        .set("enable.auto.commit", tuning.enable_auto_commit.to_string())
        .set("session.timeout.ms", tuning.session_timeout_ms.to_string())
        .set("auto.offset.reset", &tuning.auto_offset_reset)
        .set(
            "api.version.request",
            tuning.api_version_request.to_string(),
        )
        // End-of-partition signals are the scanner's termination condition.
        .set("enable.partition.eof", "true")
        .set("security.protocol", "ssl")
        .set("ssl.key.location", tls.key_path().to_string_lossy())
        .set(
            "ssl.certificate.location",
            env.tls.certificate_location.to_string_lossy(),
        )
        .set("ssl.ca.location", env.tls.ca_location.to_string_lossy());
    config
}
