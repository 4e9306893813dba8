//! Search parameter resolver.
//!
//! Normalizes a heterogeneous raw request (form fields, query parameters
//! and JSON body, already extracted into flat maps by the HTTP
//! collaborator) into a canonical [`SearchRequest`]. Rejects the request before any
//! broker I/O when no search string is present or no topic resolves into
//! either set.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use kafkasift_common::{Error, Result};
use kafkasift_config::{Settings, TopicCatalog};
use serde_json::{Map, Value};

use crate::types::SearchRequest;

// Incoming request keys, kept for wire compatibility with existing callers.
pub const KEY_SEARCH_STRING: &str = "searchParam";
pub const KEY_ENVIRONMENT: &str = "environment";
pub const KEY_INCLUDE_METADATA: &str = "includeKafkaMetadata";
pub const KEY_INCLUDE_DELIMITER: &str = "includeDelimiter";
pub const KEY_OTHER_TOPIC: &str = "otherTopic";
pub const KEY_JSON_TOPICS: &str = "json_topics";
pub const KEY_AVRO_TOPICS: &str = "avro_topics";
pub const KEY_NOT_BEFORE: &str = "notBefore";
pub const KEY_SEARCH_COUNT: &str = "search_count";

/// Sentinel meaning "no other topic supplied".
const OTHER_TOPIC_NONE: &str = "none";

/// A raw request as handed over by the HTTP collaborator: the flat
/// key/value maps of each body shape it recognized, in merge order
/// (later sources override earlier ones), plus the raw body for the
/// last-resort JSON parse.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub sources: Vec<Map<String, Value>>,
    pub raw_body: Option<String>,
}

/// Resolve a raw request into canonical search parameters.
pub fn resolve(
    raw: &RawRequest,
    settings: &Settings,
    catalog: &TopicCatalog,
) -> Result<SearchRequest> {
    let merged = merge_sources(raw)?;

    let search_string = string_param(&merged, KEY_SEARCH_STRING)
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();

    let environment = string_param(&merged, KEY_ENVIRONMENT)
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| settings.default_environment.clone());

    let include_metadata = flag_param(&merged, KEY_INCLUDE_METADATA);
    let include_delimiter = flag_param(&merged, KEY_INCLUDE_DELIMITER);
    let not_before = not_before_param(&merged)?;
    let search_count = search_count_param(&merged)?;

    let mut json_topics = list_param(&merged, KEY_JSON_TOPICS);
    let mut avro_topics = list_param(&merged, KEY_AVRO_TOPICS);

    if settings.legacy_topic_matching {
        apply_legacy_topic_matching(&merged, catalog, &mut json_topics, &mut avro_topics);
    }

    // The single "other topic" convenience key routes into whichever set
    // matches its configured kind; unconfigured names are assumed plain.
    let other_topic = string_param(&merged, KEY_OTHER_TOPIC)
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| OTHER_TOPIC_NONE.to_string());
    if other_topic != OTHER_TOPIC_NONE && !other_topic.is_empty() {
        if catalog.is_avro_topic(&other_topic) {
            avro_topics.insert(other_topic);
        } else {
            json_topics.insert(other_topic);
        }
    }

    let request = SearchRequest {
        search_string,
        environment,
        include_metadata,
        include_delimiter,
        not_before,
        search_count,
        json_topics,
        avro_topics,
    };
    request.validate()?;
    Ok(request)
}

/// Secondary resolution pass: any configured topic name appearing verbatim
/// as a key or a string value of the merged request is added to its set.
/// Deprecated convenience matching, gated on `legacy_topic_matching`.
fn apply_legacy_topic_matching(
    merged: &Map<String, Value>,
    catalog: &TopicCatalog,
    json_topics: &mut BTreeSet<String>,
    avro_topics: &mut BTreeSet<String>,
) {
    for name in catalog.topic_names() {
        let as_key = merged.contains_key(name);
        let as_value = merged
            .values()
            .any(|v| v.as_str().is_some_and(|s| s == name));
        if as_key || as_value {
            if catalog.is_avro_topic(name) {
                avro_topics.insert(name.to_string());
            } else {
                json_topics.insert(name.to_string());
            }
        }
    }
}

fn merge_sources(raw: &RawRequest) -> Result<Map<String, Value>> {
    let mut merged = Map::new();
    for source in &raw.sources {
        for (k, v) in source {
            merged.insert(k.clone(), v.clone());
        }
    }
    if merged.is_empty() {
        if let Some(body) = raw.raw_body.as_deref() {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
                merged = map;
            }
        }
    }
    if merged.is_empty() {
        return Err(Error::InvalidRequest(
            "unable to parse request parameters".to_string(),
        ));
    }
    Ok(merged)
}

fn string_param(merged: &Map<String, Value>, key: &str) -> Option<String> {
    match merged.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag_param(merged: &Map<String, Value>, key: &str) -> bool {
    match merged.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Explicit topic lists: an array of names, or a single name as a string.
fn list_param(merged: &Map<String, Value>, key: &str) -> BTreeSet<String> {
    match merged.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            std::iter::once(s.trim().to_string()).collect()
        }
        _ => BTreeSet::new(),
    }
}

fn not_before_param(merged: &Map<String, Value>) -> Result<Option<DateTime<Utc>>> {
    let raw = match string_param(merged, KEY_NOT_BEFORE) {
        Some(s) => s.trim().to_lowercase(),
        None => return Ok(None),
    };
    if raw.is_empty() || raw == "false" {
        return Ok(None);
    }
    parse_not_before(&raw).map(Some)
}

/// Parse an ISO-8601 timestamp, normalized to UTC. Accepts RFC 3339 as
/// well as the space- or T-separated `yyyy-MM-dd HH:mm:ss` shape existing
/// callers send.
fn parse_not_before(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dt%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::InvalidRequest(format!(
        "error parsing notBefore '{raw}': value must match pattern yyyy-MM-dd HH:mm:ss"
    )))
}

fn search_count_param(merged: &Map<String, Value>) -> Result<Option<u64>> {
    match merged.get(KEY_SEARCH_COUNT) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
            Error::InvalidRequest(format!("invalid search_count: {n}"))
        }),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| {
            Error::InvalidRequest(format!("invalid search_count: {s}"))
        }),
        Some(other) => Err(Error::InvalidRequest(format!(
            "invalid search_count: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> Settings {
        serde_yaml::from_str(
            r#"
default_environment: dev
consumer:
  group_id: kafkasift
  client_id: kafkasift-01
environments:
  dev:
    brokers: ["broker:9093"]
    schema_registry_url: https://registry:8081
    tls:
      pfx_file: /tmp/dev.pfx
      pfx_password: secret
      certificate_location: /tmp/cert.pem
      ca_location: /tmp/ca.pem
"#,
        )
        .unwrap()
    }

    fn catalog() -> TopicCatalog {
        TopicCatalog {
            json_topics: ["orders", "payments"].iter().map(|s| s.to_string()).collect(),
            avro_topics: [("inventory".to_string(), "inventory-value".to_string())]
                .into_iter()
                .collect(),
        }
    }

    fn raw(map: Value) -> RawRequest {
        let Value::Object(map) = map else { panic!("want object") };
        RawRequest {
            sources: vec![map],
            raw_body: None,
        }
    }

    #[test]
    fn resolves_explicit_lists_and_normalizes_strings() {
        let request = resolve(
            &raw(json!({
                "searchParam": "  Order-42 ",
                "environment": "DEV",
                "includeKafkaMetadata": "true",
                "json_topics": ["orders"],
                "avro_topics": ["inventory"],
            })),
            &settings(),
            &catalog(),
        )
        .unwrap();

        assert_eq!(request.search_string, "order-42");
        assert_eq!(request.environment, "dev");
        assert!(request.include_metadata);
        assert!(!request.include_delimiter);
        assert!(request.json_topics.contains("orders"));
        assert!(request.avro_topics.contains("inventory"));
    }

    #[test]
    fn missing_search_string_is_rejected() {
        let err = resolve(
            &raw(json!({"json_topics": ["orders"]})),
            &settings(),
            &catalog(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn no_resolved_topics_is_rejected() {
        let err = resolve(
            &raw(json!({"searchParam": "abc"})),
            &settings(),
            &catalog(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn empty_request_falls_back_to_raw_body() {
        let request = resolve(
            &RawRequest {
                sources: vec![],
                raw_body: Some(
                    r#"{"searchParam": "abc", "json_topics": ["orders"]}"#.to_string(),
                ),
            },
            &settings(),
            &catalog(),
        )
        .unwrap();
        assert_eq!(request.search_string, "abc");
    }

    #[test]
    fn empty_request_with_unparseable_body_is_rejected() {
        let err = resolve(
            &RawRequest {
                sources: vec![],
                raw_body: Some("not json".to_string()),
            },
            &settings(),
            &catalog(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn later_sources_override_earlier_ones() {
        let form = json!({"searchParam": "from-form", "json_topics": ["orders"]});
        let query = json!({"searchParam": "from-query"});
        let (Value::Object(form), Value::Object(query)) = (form, query) else {
            panic!("want objects");
        };
        let request = resolve(
            &RawRequest {
                sources: vec![form, query],
                raw_body: None,
            },
            &settings(),
            &catalog(),
        )
        .unwrap();
        assert_eq!(request.search_string, "from-query");
    }

    #[test]
    fn legacy_matching_picks_topics_from_keys_and_values() {
        let request = resolve(
            &raw(json!({
                "searchParam": "abc",
                "payments": "on",
                "topic": "inventory",
            })),
            &settings(),
            &catalog(),
        )
        .unwrap();

        assert!(request.json_topics.contains("payments"));
        assert!(request.avro_topics.contains("inventory"));
        assert!(!request.json_topics.contains("orders"));
    }

    #[test]
    fn legacy_matching_can_be_disabled() {
        let mut settings = settings();
        settings.legacy_topic_matching = false;
        let err = resolve(
            &raw(json!({"searchParam": "abc", "payments": "on"})),
            &settings,
            &catalog(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn other_topic_routes_by_configured_kind() {
        let request = resolve(
            &raw(json!({
                "searchParam": "abc",
                "otherTopic": "inventory",
            })),
            &settings(),
            &catalog(),
        )
        .unwrap();
        assert!(request.avro_topics.contains("inventory"));

        let request = resolve(
            &raw(json!({
                "searchParam": "abc",
                "otherTopic": "ad-hoc-topic",
            })),
            &settings(),
            &catalog(),
        )
        .unwrap();
        assert!(request.json_topics.contains("ad-hoc-topic"));
    }

    #[test]
    fn other_topic_none_is_ignored() {
        let err = resolve(
            &raw(json!({"searchParam": "abc", "otherTopic": "none"})),
            &settings(),
            &catalog(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn not_before_accepts_iso_shapes_and_rejects_garbage() {
        let request = resolve(
            &raw(json!({
                "searchParam": "abc",
                "json_topics": ["orders"],
                "notBefore": "2024-05-01 12:30:00",
            })),
            &settings(),
            &catalog(),
        )
        .unwrap();
        let not_before = request.not_before.unwrap();
        assert_eq!(not_before.to_rfc3339(), "2024-05-01T12:30:00+00:00");

        let err = resolve(
            &raw(json!({
                "searchParam": "abc",
                "json_topics": ["orders"],
                "notBefore": "yesterday",
            })),
            &settings(),
            &catalog(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn not_before_false_or_empty_means_absent() {
        for value in ["false", "", "  "] {
            let request = resolve(
                &raw(json!({
                    "searchParam": "abc",
                    "json_topics": ["orders"],
                    "notBefore": value,
                })),
                &settings(),
                &catalog(),
            )
            .unwrap();
            assert!(request.not_before.is_none(), "for {value:?}");
        }
    }

    #[test]
    fn search_count_is_carried_but_optional() {
        let request = resolve(
            &raw(json!({
                "searchParam": "abc",
                "json_topics": ["orders"],
                "search_count": "25",
            })),
            &settings(),
            &catalog(),
        )
        .unwrap();
        assert_eq!(request.search_count, Some(25));

        let err = resolve(
            &raw(json!({
                "searchParam": "abc",
                "json_topics": ["orders"],
                "search_count": "lots",
            })),
            &settings(),
            &catalog(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
