//! Discovered gateway devices
//!
//! The [`DiscoveryRegistry`] remembers every gateway reported by discovery
//! for the lifetime of the integration. Entries are keyed by UDN and are
//! never evicted; a later discovery of the same UDN replaces the earlier
//! descriptor in place.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::consts::{CONF_SSDP_DESCRIPTION, CONF_UDN, DISCOVERY_HOST, DISCOVERY_NAME};
use crate::error::IgdError;

/// A gateway as reported by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Unique Device Name, stable across restarts
    pub udn: String,
    pub host: String,
    /// Name the device declares for itself
    pub name: String,
    /// URL of the SSDP device description
    pub ssdp_description: String,
}

impl DeviceDescriptor {
    pub fn new(
        udn: impl Into<String>,
        host: impl Into<String>,
        name: impl Into<String>,
        ssdp_description: impl Into<String>,
    ) -> Self {
        Self {
            udn: udn.into(),
            host: host.into(),
            name: name.into(),
            ssdp_description: ssdp_description.into(),
        }
    }

    /// Build a descriptor from discovery info.
    ///
    /// `udn`, `host`, `name` and `ssdp_description` must be present as
    /// non-empty strings; other keys are ignored.
    pub fn from_discovery_info(info: &serde_json::Value) -> Result<Self, IgdError> {
        let field = |key: &'static str| {
            info.get(key)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or(IgdError::MalformedDescriptor { field: key })
        };

        Ok(Self {
            udn: field(CONF_UDN)?,
            host: field(DISCOVERY_HOST)?,
            name: field(DISCOVERY_NAME)?,
            ssdp_description: field(CONF_SSDP_DESCRIPTION)?,
        })
    }

    /// Label shown to the user: `"{host} ({name})"`
    pub fn friendly_name(&self) -> String {
        format!("{} ({})", self.host, self.name)
    }
}

/// Gateways seen by discovery, keyed by UDN in first-seen order
#[derive(Debug, Default)]
pub struct DiscoveryRegistry {
    devices: RwLock<IndexMap<String, DeviceDescriptor>>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a discovered device, returning the descriptor it replaced
    pub fn insert(&self, descriptor: DeviceDescriptor) -> Option<DeviceDescriptor> {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        let udn = descriptor.udn.clone();
        let previous = devices.insert(udn.clone(), descriptor);
        debug!(
            "Stored discovery info for {} ({} known)",
            udn,
            devices.len()
        );
        previous
    }

    pub fn get(&self, udn: &str) -> Option<DeviceDescriptor> {
        self.read(|devices| devices.get(udn).cloned())
    }

    pub fn len(&self) -> usize {
        self.read(|devices| devices.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First device whose friendly name matches
    pub fn find_by_friendly_name(&self, friendly_name: &str) -> Option<DeviceDescriptor> {
        self.read(|devices| {
            devices
                .values()
                .find(|d| d.friendly_name() == friendly_name)
                .cloned()
        })
    }

    /// Friendly names of devices whose UDN is not configured
    pub fn eligible_names(&self, configured_udns: &HashSet<String>) -> Vec<String> {
        self.friendly_names(|d| !configured_udns.contains(&d.udn))
    }

    /// Friendly names of devices whose UDN is already configured
    pub fn configured_names(&self, configured_udns: &HashSet<String>) -> Vec<String> {
        self.friendly_names(|d| configured_udns.contains(&d.udn))
    }

    fn friendly_names(&self, keep: impl Fn(&DeviceDescriptor) -> bool) -> Vec<String> {
        self.read(|devices| {
            devices
                .values()
                .filter(|d| keep(d))
                .map(DeviceDescriptor::friendly_name)
                .collect()
        })
    }

    fn read<T>(&self, f: impl FnOnce(&IndexMap<String, DeviceDescriptor>) -> T) -> T {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        f(&devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router(udn: &str, host: &str) -> DeviceDescriptor {
        DeviceDescriptor::new(udn, host, "Router", format!("http://{}:5000/rootDesc.xml", host))
    }

    #[test]
    fn test_from_discovery_info() {
        let info = json!({
            "udn": "uuid:router-1",
            "host": "10.0.0.1",
            "name": "Router",
            "ssdp_description": "http://10.0.0.1:5000/rootDesc.xml",
            "manufacturer": "ignored",
        });

        let descriptor = DeviceDescriptor::from_discovery_info(&info).unwrap();
        assert_eq!(descriptor, router("uuid:router-1", "10.0.0.1"));
        assert_eq!(descriptor.friendly_name(), "10.0.0.1 (Router)");
    }

    #[test]
    fn test_from_discovery_info_missing_key() {
        let info = json!({
            "udn": "uuid:router-1",
            "name": "Router",
            "ssdp_description": "http://10.0.0.1:5000/rootDesc.xml",
        });

        assert_eq!(
            DeviceDescriptor::from_discovery_info(&info),
            Err(IgdError::MalformedDescriptor { field: "host" })
        );
    }

    #[test]
    fn test_from_discovery_info_rejects_wrong_type_and_empty() {
        let info = json!({
            "udn": 42,
            "host": "10.0.0.1",
            "name": "Router",
            "ssdp_description": "http://10.0.0.1:5000/rootDesc.xml",
        });
        assert_eq!(
            DeviceDescriptor::from_discovery_info(&info),
            Err(IgdError::MalformedDescriptor { field: "udn" })
        );

        let info = json!({
            "udn": "uuid:router-1",
            "host": "10.0.0.1",
            "name": "Router",
            "ssdp_description": "",
        });
        assert_eq!(
            DeviceDescriptor::from_discovery_info(&info),
            Err(IgdError::MalformedDescriptor {
                field: "ssdp_description"
            })
        );

        assert!(DeviceDescriptor::from_discovery_info(&json!("udn")).is_err());
    }

    #[test]
    fn test_insert_replaces_same_udn() {
        let registry = DiscoveryRegistry::new();

        assert!(registry.insert(router("u1", "10.0.0.1")).is_none());
        let previous = registry.insert(router("u1", "10.0.0.9")).unwrap();

        assert_eq!(previous.host, "10.0.0.1");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("u1").unwrap().host, "10.0.0.9");
    }

    #[test]
    fn test_eligible_and_configured_names() {
        let registry = DiscoveryRegistry::new();
        registry.insert(router("u1", "10.0.0.1"));
        registry.insert(router("u2", "10.0.0.2"));
        registry.insert(router("u3", "10.0.0.3"));

        let configured: HashSet<String> = ["u2".to_string()].into_iter().collect();

        assert_eq!(
            registry.eligible_names(&configured),
            vec!["10.0.0.1 (Router)", "10.0.0.3 (Router)"]
        );
        assert_eq!(
            registry.configured_names(&configured),
            vec!["10.0.0.2 (Router)"]
        );
    }

    #[test]
    fn test_find_by_friendly_name_returns_first_match() {
        let registry = DiscoveryRegistry::new();
        registry.insert(router("u1", "10.0.0.1"));
        // Same host and name under a different UDN
        registry.insert(router("u2", "10.0.0.1"));

        let found = registry.find_by_friendly_name("10.0.0.1 (Router)").unwrap();
        assert_eq!(found.udn, "u1");
        assert!(registry.find_by_friendly_name("Router (10.0.0.1)").is_none());
    }
}
