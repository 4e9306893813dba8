//! kafkasift command line front end.
//!
//! Thin caller-facing wrapper around the search engine: loads the YAML
//! configuration, shapes the flags into the same raw parameter map the
//! HTTP collaborator would hand over, and prints the aggregated result as
//! JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use kafkasift_config::{Settings, TopicCatalog};
use kafkasift_search::resolver::{
    self, KEY_AVRO_TOPICS, KEY_ENVIRONMENT, KEY_INCLUDE_DELIMITER, KEY_INCLUDE_METADATA,
    KEY_JSON_TOPICS, KEY_NOT_BEFORE, KEY_OTHER_TOPIC, KEY_SEARCH_STRING,
};
use kafkasift_search::{RawRequest, SearchEngine};
use serde_json::{json, Map, Value};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "kafkasift",
    about = "Case-insensitive substring search across Kafka topics",
    version
)]
struct Args {
    /// Connection settings file
    #[arg(long, env = "KAFKASIFT_CONFIG", default_value = "configurations/main_config.yml")]
    config: PathBuf,

    /// JSON topic list file
    #[arg(long, env = "KAFKASIFT_JSON_TOPICS", default_value = "topics/json_topics.yml")]
    json_topics_file: PathBuf,

    /// Avro topic table file
    #[arg(long, env = "KAFKASIFT_AVRO_TOPICS", default_value = "topics/avro_topics.yml")]
    avro_topics_file: PathBuf,

    /// Substring to search for (matched case-insensitively)
    #[arg(short, long)]
    search: String,

    /// Environment to connect to (defaults to the configured one)
    #[arg(short, long)]
    environment: Option<String>,

    /// Attach decoded key and transport attributes to each match
    #[arg(long)]
    include_metadata: bool,

    /// Insert the visual separator block between matches
    #[arg(long)]
    include_delimiter: bool,

    /// Plain JSON topic to scan (repeatable)
    #[arg(long = "json-topic")]
    json_topics: Vec<String>,

    /// Schema-encoded topic to scan (repeatable)
    #[arg(long = "avro-topic")]
    avro_topics: Vec<String>,

    /// Single additional topic, routed by its configured kind
    #[arg(long)]
    other_topic: Option<String>,

    /// Only-after timestamp; parsed and validated but not applied as a
    /// filter yet
    #[arg(long)]
    not_before: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let settings = Arc::new(Settings::from_file(&args.config)?);
    let catalog = Arc::new(TopicCatalog::from_files(
        &args.json_topics_file,
        &args.avro_topics_file,
    )?);

    let raw = RawRequest {
        sources: vec![raw_parameters(&args)],
        raw_body: None,
    };
    let request = resolver::resolve(&raw, &settings, &catalog)?;
    info!(
        environment = %request.environment,
        json_topics = request.json_topics.len(),
        avro_topics = request.avro_topics.len(),
        "resolved search request"
    );

    let engine = SearchEngine::new(settings, catalog);
    let response = engine.execute(request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn raw_parameters(args: &Args) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(KEY_SEARCH_STRING.to_string(), json!(args.search));
    if let Some(environment) = &args.environment {
        map.insert(KEY_ENVIRONMENT.to_string(), json!(environment));
    }
    if args.include_metadata {
        map.insert(KEY_INCLUDE_METADATA.to_string(), json!("true"));
    }
    if args.include_delimiter {
        map.insert(KEY_INCLUDE_DELIMITER.to_string(), json!("true"));
    }
    if !args.json_topics.is_empty() {
        map.insert(KEY_JSON_TOPICS.to_string(), json!(args.json_topics));
    }
    if !args.avro_topics.is_empty() {
        map.insert(KEY_AVRO_TOPICS.to_string(), json!(args.avro_topics));
    }
    if let Some(other_topic) = &args.other_topic {
        map.insert(KEY_OTHER_TOPIC.to_string(), json!(other_topic));
    }
    if let Some(not_before) = &args.not_before {
        map.insert(KEY_NOT_BEFORE.to_string(), json!(not_before));
    }
    map
}
