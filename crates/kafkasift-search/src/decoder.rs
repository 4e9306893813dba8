//! Payload decoders, polymorphic over the two topic encodings.
//!
//! `JsonDecoder` parses plain structured values. `AvroDecoder` is bound
//! per topic per request: binding fetches the topic's registered schema
//! through the registry client (failing before any partition is touched),
//! decoding strips the Confluent wire framing and reads the datum against
//! the bound schema. Per-message decode failures are the caller's to skip;
//! only binding failures are fatal for a topic.

use apache_avro::types::Value as AvroValue;
use apache_avro::{from_avro_datum, Schema};
use kafkasift_common::types::{Offset, Timestamp};
use kafkasift_common::{Error, Result};
use kafkasift_config::TopicCatalog;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::registry::RegistryClient;

/// Decodes one raw message value into a structured record.
pub trait PayloadDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<Value>;
}

/// Plain-structured payloads: the value is a JSON document.
pub struct JsonDecoder;

impl PayloadDecoder for JsonDecoder {
    fn decode(&self, payload: &[u8]) -> Result<Value> {
        serde_json::from_slice(payload)
            .map_err(|e| Error::Decode(format!("malformed JSON value: {e}")))
    }
}

/// Schema-encoded payloads: Confluent-framed Avro datums decoded against
/// the schema bound at construction.
#[derive(Debug)]
pub struct AvroDecoder {
    schema: Schema,
}

impl AvroDecoder {
    /// Bind a decoder for one topic. The topic must carry a schema
    /// reference in the catalog; the subject's latest schema is fetched
    /// once and reused for the whole topic scan.
    pub async fn bind(
        registry: &RegistryClient,
        catalog: &TopicCatalog,
        topic: &str,
    ) -> Result<Self> {
        let subject = catalog.avro_subject(topic).ok_or_else(|| {
            Error::SchemaNotConfigured(format!(
                "application does not have a schema reference for requested topic: {topic}"
            ))
        })?;
        let schema = registry.latest_schema(subject).await?;
        debug!(topic, subject, "bound avro decoder");
        Ok(Self { schema })
    }

    /// Bind directly to an already-compiled schema.
    pub fn from_schema(schema: Schema) -> Self {
        Self { schema }
    }
}

impl PayloadDecoder for AvroDecoder {
    fn decode(&self, payload: &[u8]) -> Result<Value> {
        let mut datum = strip_wire_framing(payload)?;
        let value = from_avro_datum(&self.schema, &mut datum, None)
            .map_err(|e| Error::Decode(format!("error deserializing avro message: {e}")))?;
        Ok(avro_to_json(value))
    }
}

/// Confluent wire format: one zero magic byte, a 4-byte big-endian schema
/// id, then the datum.
fn strip_wire_framing(payload: &[u8]) -> Result<&[u8]> {
    if payload.len() < 5 {
        return Err(Error::Decode(
            "payload shorter than the schema wire header".to_string(),
        ));
    }
    if payload[0] != 0 {
        return Err(Error::Decode(format!(
            "unexpected wire format magic byte: {}",
            payload[0]
        )));
    }
    Ok(&payload[5..])
}

/// Render a decoded Avro value as JSON, so matching and response assembly
/// treat both payload kinds uniformly.
fn avro_to_json(value: AvroValue) -> Value {
    match value {
        AvroValue::Null => Value::Null,
        AvroValue::Boolean(b) => Value::Bool(b),
        AvroValue::Int(i) => json!(i),
        AvroValue::Long(i) => json!(i),
        AvroValue::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AvroValue::Double(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AvroValue::String(s) => Value::String(s),
        AvroValue::Bytes(bytes) | AvroValue::Fixed(_, bytes) => {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        AvroValue::Enum(_, symbol) => Value::String(symbol),
        AvroValue::Union(_, inner) => avro_to_json(*inner),
        AvroValue::Array(items) => Value::Array(items.into_iter().map(avro_to_json).collect()),
        AvroValue::Map(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, avro_to_json(v)))
                .collect(),
        ),
        AvroValue::Record(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, v)| (name, avro_to_json(v)))
                .collect(),
        ),
        AvroValue::Date(days) => json!(days),
        AvroValue::TimeMillis(t) => json!(t),
        AvroValue::TimeMicros(t) => json!(t),
        AvroValue::TimestampMillis(t) => json!(t),
        AvroValue::TimestampMicros(t) => json!(t),
        AvroValue::LocalTimestampMillis(t) => json!(t),
        AvroValue::LocalTimestampMicros(t) => json!(t),
        AvroValue::Uuid(id) => Value::String(id.to_string()),
        other => Value::String(format!("{other:?}")),
    }
}

/// Attach the `additional_added_metadata` sub-record to a matched record:
/// the decoded message key plus the transport attributes the deployment
/// exposes. Key decode failures land as an inline error string in that
/// field; they never fail the message. Non-object records are returned
/// unchanged.
pub fn attach_metadata(
    record: Value,
    key: Option<&[u8]>,
    partition: i32,
    offset: Offset,
    timestamp: Option<Timestamp>,
) -> Value {
    let Value::Object(mut map) = record else {
        return record;
    };
    let mut meta = Map::new();
    meta.insert("key".to_string(), decode_key(key));
    meta.insert("partition".to_string(), json!(partition));
    meta.insert("offset".to_string(), json!(offset));
    if let Some(ts) = timestamp {
        meta.insert("timestamp".to_string(), json!(ts));
    }
    map.insert("additional_added_metadata".to_string(), Value::Object(meta));
    Value::Object(map)
}

/// Decode a message key: structured parse when it looks like a JSON
/// object, opaque text otherwise, inline error string on failure.
fn decode_key(key: Option<&[u8]>) -> Value {
    let Some(bytes) = key else {
        return Value::Null;
    };
    match std::str::from_utf8(bytes) {
        Ok(text) if text.trim_start().starts_with('{') => match serde_json::from_str(text) {
            Ok(parsed) => parsed,
            Err(e) => Value::String(format!("error retrieving key: {e}")),
        },
        Ok(text) => Value::String(text.to_string()),
        Err(e) => Value::String(format!("error retrieving key: {e}")),
    }
}
