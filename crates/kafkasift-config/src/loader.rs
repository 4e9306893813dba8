//! YAML loading for connection settings and topic tables.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use kafkasift_common::{Error, Result};
use tracing::info;

use crate::types::{Settings, TopicCatalog};

impl Settings {
    /// Load connection settings from a YAML file and validate them.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let settings: Settings = serde_yaml::from_str(&content).map_err(|e| {
            Error::Configuration(format!("{}: {e}", path.display()))
        })?;
        settings.validate()?;
        info!(path = %path.display(), environments = settings.environments.len(), "loaded connection settings");
        Ok(settings)
    }
}

impl TopicCatalog {
    /// Load the topic tables from their two YAML files.
    ///
    /// Either file may be an empty document; that kind of topic is then
    /// simply unavailable.
    pub fn from_files(
        json_topics: impl AsRef<Path>,
        avro_topics: impl AsRef<Path>,
    ) -> Result<Self> {
        let json_topics = load_optional::<HashSet<String>>(json_topics.as_ref())?;
        let avro_topics = load_optional::<HashMap<String, String>>(avro_topics.as_ref())?;
        let catalog = TopicCatalog {
            json_topics: json_topics.unwrap_or_default(),
            avro_topics: avro_topics.unwrap_or_default(),
        };
        info!(
            json_topics = catalog.json_topics.len(),
            avro_topics = catalog.avro_topics.len(),
            "loaded topic catalog"
        );
        Ok(catalog)
    }
}

fn load_optional<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_yaml::from_str(&content)
        .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MAIN_CONFIG: &str = r#"
default_environment: dev
consumer:
  group_id: kafkasift
  client_id: kafkasift-01
  session_timeout_ms: 15000
environments:
  dev:
    brokers: ["broker-1.dev:9093", "broker-2.dev:9093"]
    schema_registry_url: https://registry.dev:8081
    tls:
      pfx_file: /etc/kafkasift/dev.pfx
      pfx_password: changeit
      certificate_location: /etc/kafkasift/dev-cert.pem
      ca_location: /etc/kafkasift/ca.pem
"#;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_main_config() {
        let file = write_temp(MAIN_CONFIG);
        let settings = Settings::from_file(file.path()).unwrap();

        assert_eq!(settings.default_environment, "dev");
        assert_eq!(settings.consumer.session_timeout_ms, 15000);
        assert_eq!(settings.consumer.auto_offset_reset, "earliest");
        assert!(settings.legacy_topic_matching);
        assert!(!settings.consumer.enable_auto_commit);
        assert_eq!(settings.request_timeout_secs, 300);

        let env = settings.environment("dev").unwrap();
        assert_eq!(env.brokers.len(), 2);
    }

    #[test]
    fn missing_key_error_names_the_key() {
        let file = write_temp("default_environment: dev\nenvironments: {}\n");
        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("consumer"), "got: {err}");
    }

    #[test]
    fn default_environment_must_exist() {
        let broken = MAIN_CONFIG.replace("default_environment: dev", "default_environment: prod");
        let file = write_temp(&broken);
        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("prod"), "got: {err}");
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let broken = format!("{MAIN_CONFIG}request_timeout_secs: 0\n");
        let file = write_temp(&broken);
        let err = Settings::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"), "got: {err}");
    }

    #[test]
    fn unknown_environment_lookup_fails() {
        let file = write_temp(MAIN_CONFIG);
        let settings = Settings::from_file(file.path()).unwrap();
        assert!(settings.environment("staging").is_err());
    }

    #[test]
    fn loads_topic_catalog() {
        let json = write_temp("- orders\n- payments\n");
        let avro = write_temp("inventory: inventory-value\n");
        let catalog = TopicCatalog::from_files(json.path(), avro.path()).unwrap();

        assert!(catalog.json_topics.contains("orders"));
        assert!(catalog.is_avro_topic("inventory"));
        assert_eq!(catalog.avro_subject("inventory"), Some("inventory-value"));
        assert_eq!(catalog.avro_subject("orders"), None);
        assert_eq!(catalog.topic_names().count(), 3);
    }

    #[test]
    fn empty_topic_files_load_as_empty_tables() {
        let json = write_temp("");
        let avro = write_temp("");
        let catalog = TopicCatalog::from_files(json.path(), avro.path()).unwrap();
        assert!(catalog.json_topics.is_empty());
        assert!(catalog.avro_topics.is_empty());
    }
}
