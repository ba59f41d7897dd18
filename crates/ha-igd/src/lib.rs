//! UPnP Internet Gateway Device integration
//!
//! Registers gateways found by discovery as config entries. Discovery events
//! start a flow that either asks the user which capabilities to enable or,
//! when `igd:` is present in `configuration.yaml`, creates the entry right
//! away using the configured defaults.
//!
//! # Example
//!
//! ```ignore
//! let data = ha_igd::setup(&config, &flows)?;
//! let result = ha_igd::handle_discovery(&flows, info).await?;
//! ```

pub mod config;
pub mod config_flow;
pub mod consts;
pub mod discovery;
pub mod error;
pub mod state_machine;

use std::sync::Arc;

use ha_config::{ConfigResult, Value};
use ha_config_entries::{
    ConfigEntries, ConfigEntrySource, ConfigFlow, ConfigFlowHandler, ConfigFlowManager,
    FlowError, FlowResult,
};
use tracing::{debug, info};

pub use config::{AutoConfigSettings, IgdConfig};
pub use config_flow::{configured_udns, IgdConfigFlow};
pub use consts::DOMAIN;
pub use discovery::{DeviceDescriptor, DiscoveryRegistry};
pub use error::IgdError;
pub use state_machine::{AbortReason, FlowState, ImportRequest};

/// Integration-wide state shared by every IGD flow
#[derive(Debug, Default)]
pub struct IgdData {
    /// Every gateway seen since setup
    pub discovered: DiscoveryRegistry,
    pub auto_config: AutoConfigSettings,
}

impl IgdData {
    pub fn new(auto_config: AutoConfigSettings) -> Self {
        Self {
            discovered: DiscoveryRegistry::new(),
            auto_config,
        }
    }
}

/// Set up the integration from the full configuration and register its
/// config flow.
pub fn setup(config: &Value, flows: &ConfigFlowManager) -> ConfigResult<Arc<IgdData>> {
    let igd_config = IgdConfig::from_config(config)?;
    let auto_config = AutoConfigSettings::from_config(igd_config.as_ref());
    if auto_config.active {
        info!(
            "IGD auto-config active (sensors: {}, port_forward: {})",
            auto_config.sensors, auto_config.port_forward
        );
    }

    let data = Arc::new(IgdData::new(auto_config));
    register_flow(flows, data.clone());
    Ok(data)
}

/// Register the IGD config flow with the manager, sharing `data`
pub fn register_flow(flows: &ConfigFlowManager, data: Arc<IgdData>) {
    let entries: Arc<ConfigEntries> = flows.entries().clone();
    flows.register_flow(
        DOMAIN,
        Arc::new(move || {
            Box::new(IgdConfigFlow::new(data.clone(), entries.clone())) as Box<dyn ConfigFlow>
        }),
    );
}

/// Start a discovery flow for a gateway reported by discovery
pub async fn handle_discovery(
    flows: &ConfigFlowManager,
    discovery_info: serde_json::Value,
) -> Result<FlowResult, FlowError> {
    debug!("IGD discovered: {}", discovery_info);
    flows
        .start_flow(DOMAIN, ConfigEntrySource::Discovery, Some(discovery_info))
        .await
}

/// Register a discovered gateway directly, without showing a form
pub async fn import_device(
    flows: &ConfigFlowManager,
    request: &ImportRequest,
) -> Result<FlowResult, FlowError> {
    flows
        .start_flow(DOMAIN, ConfigEntrySource::Import, Some(request.to_input()))
        .await
}
