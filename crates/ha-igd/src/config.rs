//! `igd:` section of `configuration.yaml`
//!
//! Listing `igd:` in the configuration turns on auto-config: every newly
//! discovered gateway is registered without asking, using the defaults
//! given here.
//!
//! ```yaml
//! igd:
//!   sensors: true
//!   port_forward: false
//!   local_ip: 192.168.1.10
//! ```

use ha_config::{integration_config, ConfigError, ConfigResult, Value};
use serde::Deserialize;
use std::net::IpAddr;

use crate::consts::DOMAIN;

/// Parsed `igd:` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IgdConfig {
    #[serde(default = "default_sensors")]
    pub sensors: bool,
    #[serde(default)]
    pub port_forward: bool,
    /// Local address to forward ports to
    #[serde(default)]
    pub local_ip: Option<IpAddr>,
}

fn default_sensors() -> bool {
    true
}

impl Default for IgdConfig {
    fn default() -> Self {
        Self {
            sensors: default_sensors(),
            port_forward: false,
            local_ip: None,
        }
    }
}

impl IgdConfig {
    /// Read the `igd:` section from the full configuration.
    ///
    /// Returns `None` when the section is absent. A bare `igd:` uses the
    /// defaults.
    pub fn from_config(config: &Value) -> ConfigResult<Option<Self>> {
        match integration_config(config, DOMAIN) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(Self::default())),
            Some(section) => serde_yaml::from_value(section.clone())
                .map(Some)
                .map_err(|e| ConfigError::invalid_section(DOMAIN, e)),
        }
    }
}

/// Policy for registering discovered gateways without user interaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AutoConfigSettings {
    pub active: bool,
    /// Sensors flag for auto-created entries
    pub sensors: bool,
    /// Port forward flag for auto-created entries
    pub port_forward: bool,
}

impl AutoConfigSettings {
    /// Auto-config is active exactly when the integration is configured in YAML
    pub fn from_config(config: Option<&IgdConfig>) -> Self {
        match config {
            Some(config) => Self {
                active: true,
                sensors: config.sensors,
                port_forward: config.port_forward,
            },
            None => Self::default(),
        }
    }
}
