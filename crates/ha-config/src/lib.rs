//! YAML configuration loading for Home Assistant
//!
//! Loads `configuration.yaml` and resolves the custom tags integrations
//! rely on:
//!
//! - `!include path` - Include another YAML file
//! - `!env_var VAR` - Environment variable substitution
//!
//! Integrations read their own top-level section with
//! [`integration_config`].
//!
//! # Example
//!
//! ```ignore
//! use ha_config::{integration_config, load_yaml};
//!
//! let config = load_yaml("/config", "configuration.yaml")?;
//! if let Some(igd) = integration_config(&config, "igd") {
//!     // ...
//! }
//! ```

mod error;
mod loader;

pub use error::{ConfigError, ConfigResult};
pub use loader::{integration_config, load_yaml, load_yaml_string, YamlLoader};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
