//! Config flow adapter for IGD
//!
//! Maps flow steps onto [`transition`] events and effects back onto
//! [`FlowStep`]s. One `IgdConfigFlow` is created per started flow.

use std::collections::HashSet;
use std::sync::Arc;

use ha_config_entries::{ConfigEntries, ConfigFlow, FieldType, FlowError, FlowStep, FormField};
use tracing::debug;

use crate::consts::{
    CONF_UDN, DOMAIN, FIELD_NAME, FIELD_PORT_FORWARD, FIELD_SENSORS, STEP_DISCOVERY, STEP_IMPORT,
    STEP_USER,
};
use crate::discovery::DeviceDescriptor;
use crate::state_machine::{transition, FlowEffect, FlowEnv, FlowEvent, FlowState, ImportRequest};
use crate::IgdData;

/// UDNs of the gateways that already have a config entry
pub fn configured_udns(entries: &ConfigEntries) -> HashSet<String> {
    entries
        .get_by_domain(DOMAIN)
        .iter()
        .filter_map(|entry| entry.data_str(CONF_UDN).map(str::to_string))
        .collect()
}

/// Config flow for Internet Gateway Devices
pub struct IgdConfigFlow {
    data: Arc<IgdData>,
    entries: Arc<ConfigEntries>,
    state: FlowState,
}

impl IgdConfigFlow {
    pub fn new(data: Arc<IgdData>, entries: Arc<ConfigEntries>) -> Self {
        Self {
            data,
            entries,
            state: FlowState::Start,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    fn event_for(
        step_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowEvent, FlowError> {
        let event = match (step_id, user_input) {
            (STEP_DISCOVERY, Some(info)) => {
                FlowEvent::Discovered(DeviceDescriptor::from_discovery_info(&info)?)
            }
            (STEP_DISCOVERY, None) => {
                return Err(FlowError::InvalidInput(
                    "discovery step requires discovery info".to_string(),
                ))
            }
            // A submission without a name only asks for the selection again
            (STEP_USER, Some(input)) if input.get(FIELD_NAME).is_some() => {
                FlowEvent::UserSubmit(ImportRequest::from_input(&input)?)
            }
            (STEP_USER, _) => FlowEvent::UserInit,
            (STEP_IMPORT, Some(input)) => FlowEvent::Import(ImportRequest::from_input(&input)?),
            (STEP_IMPORT, None) => {
                return Err(FlowError::InvalidInput(
                    "import step requires a device name".to_string(),
                ))
            }
            (other, _) => return Err(FlowError::UnknownStep(other.to_string())),
        };
        Ok(event)
    }
}

fn selection_schema(options: Vec<String>) -> Vec<FormField> {
    vec![
        FormField::select(FIELD_NAME, options),
        FormField::optional(FIELD_SENSORS, FieldType::Boolean, false),
        FormField::optional(FIELD_PORT_FORWARD, FieldType::Boolean, false),
    ]
}

impl ConfigFlow for IgdConfigFlow {
    fn step(
        &mut self,
        step_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowStep, FlowError> {
        let event = Self::event_for(step_id, user_input)?;

        let configured = configured_udns(&self.entries);
        let env = FlowEnv {
            discovered: &self.data.discovered,
            configured_udns: &configured,
            auto_config: &self.data.auto_config,
        };

        let (next, effect) = transition(&self.state, event, &env)?;
        debug!("IGD flow {:?} -> {:?}", self.state, next);
        self.state = next;

        Ok(match effect {
            FlowEffect::ShowSelection { options } => {
                FlowStep::form(STEP_USER, selection_schema(options))
            }
            FlowEffect::CreateEntry(entry) => FlowStep::CreateEntry {
                data: entry.data(),
                unique_id: Some(entry.udn),
                title: entry.title,
            },
            FlowEffect::Abort(reason) => FlowStep::abort(reason.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutoConfigSettings;
    use crate::state_machine::AbortReason;
    use ha_config_entries::{ConfigEntry, Storage};
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<IgdData>, Arc<ConfigEntries>) {
        let temp_dir = TempDir::new().unwrap();
        let entries = Arc::new(ConfigEntries::new(Arc::new(Storage::new(temp_dir.path()))));
        let data = Arc::new(IgdData::new(AutoConfigSettings::default()));
        (temp_dir, data, entries)
    }

    fn discovery_info(udn: &str, host: &str) -> serde_json::Value {
        json!({
            "udn": udn,
            "host": host,
            "name": "Router",
            "ssdp_description": format!("http://{}/desc.xml", host),
        })
    }

    #[test]
    fn test_discovery_step_shows_selection_form() {
        let (_dir, data, entries) = setup();
        let mut flow = IgdConfigFlow::new(data, entries);

        let step = flow
            .step("discovery", Some(discovery_info("u1", "10.0.0.1")))
            .unwrap();

        assert_eq!(
            step,
            FlowStep::form(
                "user",
                selection_schema(vec!["10.0.0.1 (Router)".to_string()])
            )
        );
        assert_eq!(flow.state(), FlowState::AwaitingSelection);
    }

    #[test]
    fn test_user_submit_creates_entry_step() {
        let (_dir, data, entries) = setup();
        let mut flow = IgdConfigFlow::new(data, entries);

        flow.step("discovery", Some(discovery_info("u1", "10.0.0.1")))
            .unwrap();
        let step = flow
            .step(
                "user",
                Some(json!({"name": "10.0.0.1 (Router)", "sensors": true, "port_forward": false})),
            )
            .unwrap();

        let FlowStep::CreateEntry {
            title,
            data,
            unique_id,
        } = step
        else {
            panic!("expected an entry to be created");
        };
        assert_eq!(title, "Router");
        assert_eq!(unique_id.as_deref(), Some("u1"));
        assert_eq!(data["enable_sensors"], json!(true));
        assert_eq!(flow.state(), FlowState::Finalized);
    }

    #[test]
    fn test_user_input_without_name_shows_form() {
        let (_dir, data, entries) = setup();
        data.discovered.insert(DeviceDescriptor::new(
            "u1",
            "10.0.0.1",
            "Router",
            "http://10.0.0.1/desc.xml",
        ));
        let mut flow = IgdConfigFlow::new(data, entries);

        let step = flow.step("user", Some(json!({"sensors": true}))).unwrap();
        assert!(matches!(step, FlowStep::Form { .. }));
    }

    #[tokio::test]
    async fn test_configured_udns_from_entries() {
        let (_dir, data, entries) = setup();
        let mut entry_data = std::collections::HashMap::new();
        entry_data.insert("udn".to_string(), json!("u1"));
        entries
            .add(ConfigEntry::new("igd", "Router").with_data(entry_data))
            .await
            .unwrap();
        entries.add(ConfigEntry::new("other", "Other")).await.unwrap();

        let expected: HashSet<String> = ["u1".to_string()].into_iter().collect();
        assert_eq!(configured_udns(&entries), expected);

        let mut flow = IgdConfigFlow::new(data, entries);
        let step = flow
            .step("discovery", Some(discovery_info("u1", "10.0.0.1")))
            .unwrap();
        assert_eq!(step, FlowStep::abort(AbortReason::AlreadyConfigured.as_str()));
    }

    #[test]
    fn test_step_errors() {
        let (_dir, data, entries) = setup();
        let mut flow = IgdConfigFlow::new(data, entries);

        assert!(matches!(
            flow.step("discovery", Some(json!({"udn": "u1"}))),
            Err(FlowError::InvalidInput(_))
        ));
        assert!(matches!(
            flow.step("discovery", None),
            Err(FlowError::InvalidInput(_))
        ));
        assert!(matches!(
            flow.step("reauth", None),
            Err(FlowError::UnknownStep(_))
        ));
        assert_eq!(flow.state(), FlowState::Start);
    }

    #[test]
    fn test_finished_flow_rejects_further_steps() {
        let (_dir, data, entries) = setup();
        let mut flow = IgdConfigFlow::new(data, entries);

        let step = flow.step("user", None).unwrap();
        assert_eq!(step, FlowStep::abort("no_devices_discovered"));

        assert!(matches!(
            flow.step("user", None),
            Err(FlowError::InvalidState { .. })
        ));
    }
}
