//! Partition scanner.
//!
//! Scans every partition of one topic to its end, sequentially and never
//! concurrently within a scan: the consumer is assigned exclusively to one
//! partition, polled with a bounded wait until the broker signals
//! end-of-partition, then moved to the next. Matches are accumulated in
//! reverse discovery order (most-recently-scanned first); this ordering is
//! load-bearing for existing callers.

use std::time::{Duration, Instant};

use kafkasift_common::{Error, Result};
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::decoder::{attach_metadata, PayloadDecoder};

/// Bounded per-poll wait. A poll that returns nothing within it is simply
/// retried; end-of-partition or the request deadline terminates a
/// partition.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

const SEPARATOR_EDGE: &str =
    "##############################################################";
const SEPARATOR_LABEL: &str =
    "####################  MESSAGE SEPARATOR  #####################";

/// Per-scan options, derived from the resolved request.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lower-cased substring the decoded record must contain.
    pub search_string: String,
    pub include_metadata: bool,
    pub include_delimiter: bool,
    /// Shared per-request deadline. A partition still polling when it
    /// elapses fails its topic's scan instead of pinning the request on a
    /// partition whose end-of-partition signal never arrives.
    pub deadline: Instant,
}

/// Scan all partitions of `topic` to exhaustion, returning the matching
/// decoded records in reverse discovery order.
///
/// Blocking; run it under `spawn_blocking`. Transport errors other than
/// end-of-partition and per-message decode failures are skipped, never
/// fatal. Each partition is scanned to its end even when an earlier one
/// already hit EOF; crossing the request deadline fails the scan.
pub fn scan(
    consumer: &BaseConsumer,
    topic: &str,
    partitions: &[i32],
    decoder: &dyn PayloadDecoder,
    options: &ScanOptions,
) -> Result<Vec<Value>> {
    let mut accumulator = MatchAccumulator::new(options.include_delimiter);
    for &partition in partitions {
        scan_partition(consumer, topic, partition, decoder, options, &mut accumulator)?;
    }
    debug!(topic, matches = accumulator.len(), "topic scan complete");
    Ok(accumulator.into_entries())
}

fn scan_partition(
    consumer: &BaseConsumer,
    topic: &str,
    partition: i32,
    decoder: &dyn PayloadDecoder,
    options: &ScanOptions,
    accumulator: &mut MatchAccumulator,
) -> Result<()> {
    // Exclusive assignment, pinned to the head of the partition so every
    // scan observes the full log regardless of committed group state.
    let mut assignment = TopicPartitionList::new();
    assignment
        .add_partition_offset(topic, partition, Offset::Beginning)
        .map_err(|e| Error::Connection(format!("cannot build partition assignment: {e}")))?;
    consumer
        .assign(&assignment)
        .map_err(|e| Error::Connection(format!("cannot assign partition {partition}: {e}")))?;

    loop {
        if Instant::now() >= options.deadline {
            if let Err(e) = consumer.unassign() {
                warn!(topic, partition, "error releasing assignment: {e}");
            }
            return Err(Error::Connection(format!(
                "scan of topic {topic} exceeded the request deadline"
            )));
        }
        match consumer.poll(POLL_INTERVAL) {
            // Nothing delivered within the poll bound; not an end condition.
            None => continue,
            Some(Err(KafkaError::PartitionEOF(p))) => {
                trace!(topic, partition = p, "end of partition");
                if let Err(e) = consumer.unassign() {
                    warn!(topic, partition, "error releasing assignment: {e}");
                }
                break;
            }
            // Transport-level errors other than EOF: skip and keep polling.
            Some(Err(e)) => {
                debug!(topic, partition, "skipping message with transport error: {e}");
                continue;
            }
            Some(Ok(message)) => {
                let Some(payload) = message.payload() else {
                    continue;
                };
                // Malformed payloads are swallowed per-message.
                let decoded = match decoder.decode(payload) {
                    Ok(value) => value,
                    Err(e) => {
                        trace!(topic, partition, offset = message.offset(), "undecodable message: {e}");
                        continue;
                    }
                };
                if !record_matches(&decoded, &options.search_string) {
                    continue;
                }
                let record = if options.include_metadata {
                    attach_metadata(
                        decoded,
                        message.key(),
                        message.partition(),
                        message.offset(),
                        message.timestamp().to_millis(),
                    )
                } else {
                    decoded
                };
                accumulator.push(record);
            }
        }
    }
    Ok(())
}

/// Case-insensitive substring match against the record's textual form.
fn record_matches(record: &Value, search_string: &str) -> bool {
    record.to_string().to_lowercase().contains(search_string)
}

/// Accumulates matches by prepending, so the scan returns them in reverse
/// discovery order. With the delimiter enabled, the fixed 3-line separator
/// block lands between a new match and the previously accumulated entries,
/// always directly above the next-older match.
pub(crate) struct MatchAccumulator {
    entries: Vec<Value>,
    delimiter: bool,
}

impl MatchAccumulator {
    pub(crate) fn new(delimiter: bool) -> Self {
        Self {
            entries: Vec::new(),
            delimiter,
        }
    }

    pub(crate) fn push(&mut self, record: Value) {
        let separate = self.delimiter && !self.entries.is_empty();
        self.entries.insert(0, record);
        if separate {
            for (i, line) in [SEPARATOR_EDGE, SEPARATOR_LABEL, SEPARATOR_EDGE]
                .iter()
                .enumerate()
            {
                self.entries
                    .insert(i + 1, Value::String((*line).to_string()));
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn into_entries(self) -> Vec<Value> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn matches_are_returned_in_reverse_discovery_order() {
        let mut accumulator = MatchAccumulator::new(false);
        for i in 1..=5 {
            accumulator.push(json!({ "msg": format!("M{i}") }));
        }
        let entries = accumulator.into_entries();
        let order: Vec<&str> = entries.iter().map(|e| e["msg"].as_str().unwrap()).collect();
        assert_eq!(order, ["M5", "M4", "M3", "M2", "M1"]);
    }

    #[test]
    fn delimiter_block_sits_above_the_next_older_match() {
        let mut accumulator = MatchAccumulator::new(true);
        accumulator.push(json!({"msg": "M1"}));
        accumulator.push(json!({"msg": "M2"}));

        let entries = accumulator.into_entries();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0]["msg"], "M2");
        assert_eq!(entries[1], Value::String(SEPARATOR_EDGE.to_string()));
        assert_eq!(entries[2], Value::String(SEPARATOR_LABEL.to_string()));
        assert_eq!(entries[3], Value::String(SEPARATOR_EDGE.to_string()));
        assert_eq!(entries[4]["msg"], "M1");
    }

    #[test]
    fn single_match_has_no_separator() {
        let mut accumulator = MatchAccumulator::new(true);
        accumulator.push(json!({"msg": "M1"}));
        assert_eq!(accumulator.into_entries().len(), 1);
    }

    #[test]
    fn expired_deadline_fails_the_scan_instead_of_pinning_it() {
        use crate::decoder::JsonDecoder;
        use rdkafka::ClientConfig;

        // Consumer creation is local; nothing here talks to a broker.
        let consumer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", "localhost:19092")
            .set("group.id", "kafkasift-test")
            .create()
            .unwrap();
        let options = ScanOptions {
            search_string: "abc".to_string(),
            include_metadata: false,
            include_delimiter: false,
            deadline: Instant::now() - Duration::from_secs(1),
        };

        let err = scan(&consumer, "orders", &[0], &JsonDecoder, &options).unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(err.to_string().contains("deadline"), "got: {err}");
    }

    #[test]
    fn matching_is_case_insensitive_over_the_textual_form() {
        let record = json!({"customer": "ACME Corp", "total": 99});
        assert!(record_matches(&record, "acme"));
        assert!(record_matches(&record, "99"));
        assert!(record_matches(&record, "customer"));
        assert!(!record_matches(&record, "emca"));
    }
}
