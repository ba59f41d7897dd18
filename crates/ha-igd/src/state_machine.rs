//! IGD registration flow state machine
//!
//! ```text
//! Start ──discovered (auto-config)──────────→ Finalized
//!       ──discovered / user init───────────→ AwaitingSelection ──submit──→ Finalized
//!       ──import / submit──────────────────→ Finalized
//! any non-terminal ──validation failure────→ Aborted(reason)
//! ```
//!
//! Finalized and Aborted are terminal. [`transition`] takes the current
//! state and an event and returns the next state with the effect the host
//! should carry out. The only side effect is recording discovered devices in
//! the [`DiscoveryRegistry`].

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

use crate::config::AutoConfigSettings;
use crate::consts::{
    CONF_ENABLE_PORT_MAPPING, CONF_ENABLE_SENSORS, CONF_SSDP_DESCRIPTION, CONF_UDN, FIELD_NAME,
    FIELD_PORT_FORWARD, FIELD_SENSORS,
};
use crate::discovery::{DeviceDescriptor, DiscoveryRegistry};
use crate::error::IgdError;

/// Why a flow ended without creating an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The device UDN (discovery) or the chosen name (manual) is registered
    AlreadyConfigured,
    /// Neither sensors nor port forwarding was requested
    NoSensorsOrPortForward,
    /// Nothing discovered that isn't already configured
    NoDevicesDiscovered,
    /// No discovered device has the requested friendly name
    HostNotFound,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::AlreadyConfigured => "already_configured",
            AbortReason::NoSensorsOrPortForward => "no_sensors_or_port_forward",
            AbortReason::NoDevicesDiscovered => "no_devices_discovered",
            AbortReason::HostNotFound => "host_not_found",
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Start,
    AwaitingSelection,
    Finalized,
    Aborted(AbortReason),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Finalized | FlowState::Aborted(_))
    }

    fn name(&self) -> &'static str {
        match self {
            FlowState::Start => "Start",
            FlowState::AwaitingSelection => "AwaitingSelection",
            FlowState::Finalized => "Finalized",
            FlowState::Aborted(_) => "Aborted",
        }
    }
}

/// A device chosen for registration, with the capabilities to enable.
///
/// Used both for form submissions and for imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    /// Friendly name of a discovered device
    pub name: String,
    pub sensors: bool,
    pub port_forward: bool,
}

impl ImportRequest {
    pub fn new(name: impl Into<String>, sensors: bool, port_forward: bool) -> Self {
        Self {
            name: name.into(),
            sensors,
            port_forward,
        }
    }

    /// Parse `{name, sensors?, port_forward?}`; omitted flags are false
    pub fn from_input(input: &serde_json::Value) -> Result<Self, IgdError> {
        let name = input
            .get(FIELD_NAME)
            .and_then(serde_json::Value::as_str)
            .ok_or(IgdError::MalformedInput { field: FIELD_NAME })?;

        let flag = |key: &'static str| match input.get(key) {
            None | Some(serde_json::Value::Null) => Ok(false),
            Some(value) => value
                .as_bool()
                .ok_or(IgdError::MalformedInput { field: key }),
        };

        Ok(Self {
            name: name.to_string(),
            sensors: flag(FIELD_SENSORS)?,
            port_forward: flag(FIELD_PORT_FORWARD)?,
        })
    }

    pub fn to_input(&self) -> serde_json::Value {
        serde_json::json!({
            FIELD_NAME: self.name,
            FIELD_SENSORS: self.sensors,
            FIELD_PORT_FORWARD: self.port_forward,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// Discovery reported a device
    Discovered(DeviceDescriptor),
    /// The user opened the flow without input
    UserInit,
    /// The user submitted the selection form
    UserSubmit(ImportRequest),
    /// Direct registration, bypassing the form
    Import(ImportRequest),
}

impl FlowEvent {
    fn name(&self) -> &'static str {
        match self {
            FlowEvent::Discovered(_) => "discovered",
            FlowEvent::UserInit => "user_init",
            FlowEvent::UserSubmit(_) => "user_submit",
            FlowEvent::Import(_) => "import",
        }
    }
}

/// Entry to persist for a registered device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    /// Declared device name
    pub title: String,
    pub udn: String,
    pub ssdp_description: String,
    pub sensors: bool,
    pub port_forward: bool,
}

impl NewEntry {
    pub fn data(&self) -> HashMap<String, serde_json::Value> {
        HashMap::from([
            (
                CONF_SSDP_DESCRIPTION.to_string(),
                serde_json::Value::from(self.ssdp_description.clone()),
            ),
            (CONF_UDN.to_string(), serde_json::Value::from(self.udn.clone())),
            (
                CONF_ENABLE_SENSORS.to_string(),
                serde_json::Value::from(self.sensors),
            ),
            (
                CONF_ENABLE_PORT_MAPPING.to_string(),
                serde_json::Value::from(self.port_forward),
            ),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEffect {
    /// Ask the user to pick one of these friendly names
    ShowSelection { options: Vec<String> },
    CreateEntry(NewEntry),
    Abort(AbortReason),
}

/// What a transition may consult
pub struct FlowEnv<'a> {
    pub discovered: &'a DiscoveryRegistry,
    /// UDNs that already have a config entry
    pub configured_udns: &'a HashSet<String>,
    pub auto_config: &'a AutoConfigSettings,
}

/// Event delivered to a state that cannot handle it
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid flow event '{event}' in state {state}")]
pub struct InvalidTransition {
    pub state: &'static str,
    pub event: &'static str,
}

/// Advance the flow by one event
pub fn transition(
    state: &FlowState,
    event: FlowEvent,
    env: &FlowEnv<'_>,
) -> Result<(FlowState, FlowEffect), InvalidTransition> {
    use FlowState::*;

    match (state, event) {
        (Start, FlowEvent::Discovered(descriptor)) => Ok(on_discovered(descriptor, env)),
        (Start | AwaitingSelection, FlowEvent::UserInit) => Ok(present_selection(env)),
        (Start | AwaitingSelection, FlowEvent::UserSubmit(selection)) => {
            Ok(on_user_submit(&selection, env))
        }
        (Start, FlowEvent::Import(request)) => Ok(finalize(&request, env)),
        (state, event) => Err(InvalidTransition {
            state: state.name(),
            event: event.name(),
        }),
    }
}

fn abort(reason: AbortReason) -> (FlowState, FlowEffect) {
    debug!("Aborting IGD flow: {}", reason);
    (FlowState::Aborted(reason), FlowEffect::Abort(reason))
}

fn on_discovered(descriptor: DeviceDescriptor, env: &FlowEnv<'_>) -> (FlowState, FlowEffect) {
    if env.configured_udns.contains(&descriptor.udn) {
        return abort(AbortReason::AlreadyConfigured);
    }

    let friendly_name = descriptor.friendly_name();
    env.discovered.insert(descriptor);

    if env.auto_config.active {
        debug!("Auto-configuring {}", friendly_name);
        let request = ImportRequest::new(
            friendly_name,
            env.auto_config.sensors,
            env.auto_config.port_forward,
        );
        return finalize(&request, env);
    }

    present_selection(env)
}

fn present_selection(env: &FlowEnv<'_>) -> (FlowState, FlowEffect) {
    let options = env.discovered.eligible_names(env.configured_udns);
    if options.is_empty() {
        return abort(AbortReason::NoDevicesDiscovered);
    }

    (
        FlowState::AwaitingSelection,
        FlowEffect::ShowSelection { options },
    )
}

fn on_user_submit(selection: &ImportRequest, env: &FlowEnv<'_>) -> (FlowState, FlowEffect) {
    if !selection.sensors && !selection.port_forward {
        return abort(AbortReason::NoSensorsOrPortForward);
    }

    // The device may have been configured since the form was shown
    let configured_igds = env.discovered.configured_names(env.configured_udns);
    debug!("Configured IGDs: {:?}", configured_igds);
    if configured_igds.contains(&selection.name) {
        return abort(AbortReason::AlreadyConfigured);
    }

    finalize(selection, env)
}

fn finalize(request: &ImportRequest, env: &FlowEnv<'_>) -> (FlowState, FlowEffect) {
    let Some(device) = env.discovered.find_by_friendly_name(&request.name) else {
        return abort(AbortReason::HostNotFound);
    };

    (
        FlowState::Finalized,
        FlowEffect::CreateEntry(NewEntry {
            title: device.name,
            udn: device.udn,
            ssdp_description: device.ssdp_description,
            sensors: request.sensors,
            port_forward: request.port_forward,
        }),
    )
}
