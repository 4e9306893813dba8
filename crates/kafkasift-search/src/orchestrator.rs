//! Search orchestrator.
//!
//! Drives one request end to end: validates it, provisions TLS material,
//! opens one broker connection, runs the partition scanner per requested
//! topic, and aggregates per-topic results and errors. Topic failures are
//! downgraded to an error string in that topic's result slot so a partial
//! result set is still useful; only request-level failures (credentials,
//! broker unreachable) abort the whole search. The connection is always
//! torn down before returning.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kafkasift_common::types::PayloadKind;
use kafkasift_common::{Error, Result};
use kafkasift_config::{Settings, TopicCatalog};
use rdkafka::consumer::BaseConsumer;
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditSink, TracingAudit};
use crate::broker::BrokerReader;
use crate::decoder::{AvroDecoder, JsonDecoder, PayloadDecoder};
use crate::registry::RegistryClient;
use crate::scanner::{scan, ScanOptions};
use crate::tls::TlsMaterial;
use crate::types::{SearchRequest, SearchResponse, TopicOutcome, RESPONSE_ERROR_KEY};

/// Request-scoped engine over process-wide, read-only configuration.
pub struct SearchEngine {
    settings: Arc<Settings>,
    catalog: Arc<TopicCatalog>,
    audit: Arc<dyn AuditSink>,
}

impl SearchEngine {
    pub fn new(settings: Arc<Settings>, catalog: Arc<TopicCatalog>) -> Self {
        Self::with_audit(settings, catalog, Arc::new(TracingAudit))
    }

    pub fn with_audit(
        settings: Arc<Settings>,
        catalog: Arc<TopicCatalog>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            settings,
            catalog,
            audit,
        }
    }

    /// Execute one search request to completion.
    ///
    /// Scans run strictly sequentially: one topic at a time, one partition
    /// at a time, each under `spawn_blocking` since the broker polls
    /// block. The consumer is owned by this request alone, and the total
    /// scan time is bounded by the configured request timeout.
    pub async fn execute(&self, request: SearchRequest) -> Result<SearchResponse> {
        request.validate()?;
        self.audit.record(&AuditEntry::from(&request));

        let environment = self.settings.environment(&request.environment)?.clone();
        let tuning = self.settings.consumer.clone();

        // TLS materialization and the connect probe both block.
        let (reader, tls) = tokio::task::spawn_blocking(move || {
            let tls = TlsMaterial::materialize(&environment.tls)?;
            let reader = BrokerReader::connect(&environment, &tuning, &tls)?;
            Ok::<_, Error>((reader, tls))
        })
        .await
        .map_err(|e| Error::Internal(format!("connect task failed: {e}")))??;

        // One deadline bounds the whole request; topics still scanning
        // when it elapses fail into their result slot.
        let options = ScanOptions {
            search_string: request.search_string.clone(),
            include_metadata: request.include_metadata,
            include_delimiter: request.include_delimiter,
            deadline: Instant::now() + Duration::from_secs(self.settings.request_timeout_secs),
        };

        let mut response = SearchResponse::new();

        for topic in &request.json_topics {
            let key = format!("{}{topic}", PayloadKind::Json.response_prefix());
            let outcome = self
                .scan_topic(&reader, topic, Arc::new(JsonDecoder), &options)
                .await;
            response.insert(key, downgrade(outcome, "Error searching topic."));
        }

        if !request.avro_topics.is_empty() {
            match self.scan_avro_topics(&reader, &request, &tls, &options, &mut response).await {
                Ok(()) => {}
                Err(e) => {
                    // Registry unreachable is fatal for the request, but the
                    // connection still gets torn down first.
                    if let Err(close_err) = reader.close() {
                        warn!("close after registry failure also failed: {close_err}");
                    }
                    return Err(e);
                }
            }
        }

        if let Err(e) = reader.close() {
            response.insert(RESPONSE_ERROR_KEY.to_string(), TopicOutcome::Failed(e.to_string()));
        }

        info!(
            environment = %request.environment,
            topics = response.len(),
            "search complete"
        );
        Ok(response)
    }

    async fn scan_avro_topics(
        &self,
        reader: &BrokerReader,
        request: &SearchRequest,
        tls: &TlsMaterial,
        options: &ScanOptions,
        response: &mut SearchResponse,
    ) -> Result<()> {
        let environment = self.settings.environment(&request.environment)?;
        let registry = RegistryClient::connect(environment, tls)?;

        for topic in &request.avro_topics {
            let key = format!("{}{topic}", PayloadKind::Avro.response_prefix());
            // Bind the decoder before touching any partition, so schema
            // table misses and registry failures surface per topic.
            let decoder = match AvroDecoder::bind(&registry, &self.catalog, topic).await {
                Ok(decoder) => Arc::new(decoder),
                Err(e) => {
                    response.insert(key, TopicOutcome::Failed(e.to_string()));
                    continue;
                }
            };
            let outcome = self.scan_topic(reader, topic, decoder, options).await;
            response.insert(key, downgrade(outcome, "Error searching avro topic."));
        }
        Ok(())
    }

    async fn scan_topic(
        &self,
        reader: &BrokerReader,
        topic: &str,
        decoder: Arc<dyn PayloadDecoder>,
        options: &ScanOptions,
    ) -> Result<Vec<serde_json::Value>> {
        let partitions = reader.partitions_of(topic)?;
        let consumer: Arc<BaseConsumer> = reader.consumer();
        let topic = topic.to_string();
        let options = options.clone();

        tokio::task::spawn_blocking(move || {
            scan(&consumer, &topic, &partitions, decoder.as_ref(), &options)
        })
        .await
        .map_err(|e| Error::Internal(format!("scan task failed: {e}")))?
    }
}

/// Downgrade a topic-level failure to its result-slot string; sibling
/// topics keep scanning.
fn downgrade(outcome: Result<Vec<serde_json::Value>>, prefix: &str) -> TopicOutcome {
    match outcome {
        Ok(matches) => TopicOutcome::Matches(matches),
        Err(e) => {
            warn!("{prefix} {e}");
            TopicOutcome::Failed(format!("{prefix} {e}"))
        }
    }
}
