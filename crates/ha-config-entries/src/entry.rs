//! Config Entry types
//!
//! A ConfigEntry represents a single instance of an integration's configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source of a config entry, and of the flow that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Configured via UI/API
    #[default]
    User,
    /// Imported from YAML config or another integration
    Import,
    /// Generic discovery
    Discovery,
    /// mDNS/Bonjour discovery
    Zeroconf,
}

impl ConfigEntrySource {
    /// Wire name, also the id of the first flow step for this source
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigEntrySource::User => "user",
            ConfigEntrySource::Import => "import",
            ConfigEntrySource::Discovery => "discovery",
            ConfigEntrySource::Zeroconf => "zeroconf",
        }
    }
}

impl std::fmt::Display for ConfigEntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configuration entry for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain (e.g., "igd", "hue")
    pub domain: String,

    /// Human-readable display name
    pub title: String,

    /// Immutable configuration data
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// Major schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Minor schema version
    #[serde(default = "default_version")]
    pub minor_version: u32,

    /// Optional unique identifier for duplicate prevention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    /// Origin type
    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    /// Create a new config entry
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            version: 1,
            minor_version: 1,
            unique_id: None,
            source: ConfigEntrySource::User,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    pub fn with_version(mut self, version: u32, minor_version: u32) -> Self {
        self.version = version;
        self.minor_version = minor_version;
        self
    }

    /// Get a string value from the entry data
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_entry_new() {
        let entry = ConfigEntry::new("igd", "Router");
        assert_eq!(entry.domain, "igd");
        assert_eq!(entry.title, "Router");
        assert_eq!(entry.version, 1);
        assert_eq!(entry.source, ConfigEntrySource::User);
        assert!(!entry.entry_id.is_empty());
    }

    #[test]
    fn test_config_entry_builder() {
        let mut data = HashMap::new();
        data.insert("udn".to_string(), serde_json::json!("uuid:router-1"));

        let entry = ConfigEntry::new("igd", "Router")
            .with_data(data)
            .with_unique_id("uuid:router-1")
            .with_source(ConfigEntrySource::Discovery);

        assert_eq!(entry.unique_id.as_deref(), Some("uuid:router-1"));
        assert_eq!(entry.source, ConfigEntrySource::Discovery);
        assert_eq!(entry.data_str("udn"), Some("uuid:router-1"));
        assert_eq!(entry.data_str("missing"), None);
    }

    #[test]
    fn test_source_wire_names() {
        assert_eq!(ConfigEntrySource::Discovery.as_str(), "discovery");
        assert_eq!(
            serde_json::to_value(ConfigEntrySource::Import).unwrap(),
            serde_json::json!("import")
        );

        for source in [
            ConfigEntrySource::User,
            ConfigEntrySource::Import,
            ConfigEntrySource::Discovery,
            ConfigEntrySource::Zeroconf,
        ] {
            let parsed: ConfigEntrySource =
                serde_json::from_value(serde_json::json!(source.as_str())).unwrap();
            assert_eq!(parsed, source);
        }
        assert!(serde_json::from_value::<ConfigEntrySource>(serde_json::json!("system")).is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = serde_json::json!({
            "entry_id": "01J0000000000000000000000",
            "domain": "igd",
            "title": "Router",
        });

        let entry: ConfigEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.version, 1);
        assert_eq!(entry.minor_version, 1);
        assert!(entry.data.is_empty());
        assert!(entry.unique_id.is_none());
        assert_eq!(entry.source, ConfigEntrySource::User);
    }
}
