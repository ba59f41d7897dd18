//! Config Flow Manager
//!
//! Tracks in-progress config flows and turns finished flows into config
//! entries.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::entry::{ConfigEntry, ConfigEntrySource};
use crate::flow::{ConfigFlow, ConfigFlowFactory, FlowError, FlowResult, FlowStep, FormField};
use crate::manager::{ConfigEntries, ConfigEntriesError};

/// Abort reason used when an entry with the same unique_id already exists
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

/// Host-facing interface for driving config flows
#[async_trait]
pub trait ConfigFlowHandler: Send + Sync {
    /// Start a new flow for an integration
    ///
    /// # Arguments
    /// * `handler` - The integration domain (e.g., "igd")
    /// * `source` - What started the flow; selects the first step
    /// * `data` - Input for the first step (discovery info, import data)
    async fn start_flow(
        &self,
        handler: &str,
        source: ConfigEntrySource,
        data: Option<serde_json::Value>,
    ) -> Result<FlowResult, FlowError>;

    /// Continue a flow with user input for its current form
    async fn progress_flow(
        &self,
        flow_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowResult, FlowError>;

    /// List in-progress flows
    async fn list_flows(&self) -> Vec<serde_json::Value>;
}

/// Mutable part of an in-progress flow
struct FlowProgress {
    flow: Box<dyn ConfigFlow>,
    /// Step the next input is for
    step_id: String,
    /// Schema of the form last shown
    data_schema: Vec<FormField>,
}

/// An in-progress flow
struct ActiveFlow {
    handler: String,
    source: ConfigEntrySource,
    progress: Mutex<FlowProgress>,
}

impl ActiveFlow {
    async fn describe(&self, flow_id: &str) -> serde_json::Value {
        let step_id = self.progress.lock().await.step_id.clone();
        serde_json::json!({
            "flow_id": flow_id,
            "handler": self.handler,
            "step_id": step_id,
            "context": {
                "source": self.source,
            },
        })
    }
}

/// Manages configuration flows for native integrations
pub struct ConfigFlowManager {
    /// Flow factories by integration domain
    factories: DashMap<String, ConfigFlowFactory>,
    /// In-progress flows by flow_id
    flows: RwLock<HashMap<String, Arc<ActiveFlow>>>,
    entries: Arc<ConfigEntries>,
}

impl ConfigFlowManager {
    pub fn new(entries: Arc<ConfigEntries>) -> Self {
        Self {
            factories: DashMap::new(),
            flows: RwLock::new(HashMap::new()),
            entries,
        }
    }

    /// Register the config flow for a domain, replacing any previous one
    pub fn register_flow(&self, domain: &str, factory: ConfigFlowFactory) {
        self.factories.insert(domain.to_string(), factory);
        debug!("Registered config flow for domain: {}", domain);
    }

    /// Domains with a registered config flow, sorted
    pub fn flow_handlers(&self) -> Vec<String> {
        let mut handlers: Vec<String> = self.factories.iter().map(|r| r.key().clone()).collect();
        handlers.sort();
        handlers
    }

    /// The config entry store flows write into
    pub fn entries(&self) -> &Arc<ConfigEntries> {
        &self.entries
    }

    /// Describe an in-progress flow
    pub async fn get_flow(&self, flow_id: &str) -> Option<serde_json::Value> {
        let flow = self.flows.read().await.get(flow_id).cloned()?;
        Some(flow.describe(flow_id).await)
    }

    /// Abandon an in-progress flow
    pub async fn abort_flow(&self, flow_id: &str) -> Result<(), FlowError> {
        let removed = self.flows.write().await.remove(flow_id);
        match removed {
            Some(flow) => {
                info!("Flow {} for {} aborted by host", flow_id, flow.handler);
                Ok(())
            }
            None => Err(FlowError::UnknownFlow(flow_id.to_string())),
        }
    }

    /// Convert a flow step into a result, creating the config entry if the
    /// flow finished successfully.
    async fn finish_step(
        &self,
        flow_id: &str,
        handler: &str,
        source: ConfigEntrySource,
        (version, minor_version): (u32, u32),
        step: FlowStep,
    ) -> Result<FlowResult, FlowError> {
        match step {
            FlowStep::Form {
                step_id,
                data_schema,
                errors,
                description_placeholders,
            } => Ok(FlowResult::form(
                flow_id,
                handler,
                &step_id,
                data_schema,
                errors,
                description_placeholders,
            )),
            FlowStep::Abort { reason } => {
                info!("Flow {} for {} aborted: {}", flow_id, handler, reason);
                Ok(FlowResult::abort(flow_id, handler, &reason))
            }
            FlowStep::CreateEntry {
                title,
                data,
                unique_id,
            } => {
                let mut entry = ConfigEntry::new(handler, title)
                    .with_data(data)
                    .with_source(source)
                    .with_version(version, minor_version);
                if let Some(unique_id) = unique_id {
                    entry = entry.with_unique_id(unique_id);
                }

                match self.entries.add(entry).await {
                    Ok(entry) => FlowResult::create_entry(flow_id, handler, &entry),
                    Err(ConfigEntriesError::AlreadyExists { unique_id, .. }) => {
                        info!(
                            "Flow {} for {} lost the race for {}",
                            flow_id, handler, unique_id
                        );
                        Ok(FlowResult::abort(
                            flow_id,
                            handler,
                            ABORT_ALREADY_CONFIGURED,
                        ))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

/// Fill defaults for omitted optional fields and type-check the rest
fn prepare_input(
    data_schema: &[FormField],
    user_input: serde_json::Value,
) -> Result<serde_json::Value, FlowError> {
    let serde_json::Value::Object(mut input) = user_input else {
        return Err(FlowError::InvalidInput(
            "user input must be an object".to_string(),
        ));
    };

    for field in data_schema {
        match input.get(&field.name) {
            Some(value) => field.check(value)?,
            None => match (&field.default, field.required) {
                (Some(default), _) => {
                    input.insert(field.name.clone(), default.clone());
                }
                (None, true) => {
                    return Err(FlowError::InvalidInput(format!(
                        "required key not provided: '{}'",
                        field.name
                    )));
                }
                (None, false) => {}
            },
        }
    }

    Ok(serde_json::Value::Object(input))
}

#[async_trait]
impl ConfigFlowHandler for ConfigFlowManager {
    async fn start_flow(
        &self,
        handler: &str,
        source: ConfigEntrySource,
        data: Option<serde_json::Value>,
    ) -> Result<FlowResult, FlowError> {
        let factory = self
            .factories
            .get(handler)
            .map(|r| r.value().clone())
            .ok_or_else(|| FlowError::UnknownHandler(handler.to_string()))?;

        let flow_id = Ulid::new().to_string().to_lowercase();
        info!(
            "Starting config flow for {} ({}) with flow_id {}",
            handler, source, flow_id
        );

        let mut flow = factory();
        let versions = (flow.version(), flow.minor_version());
        let step = flow.step(source.as_str(), data)?;

        let progress = match &step {
            FlowStep::Form {
                step_id,
                data_schema,
                ..
            } => Some((step_id.clone(), data_schema.clone())),
            _ => None,
        };

        let result = self
            .finish_step(&flow_id, handler, source, versions, step)
            .await?;

        if let Some((step_id, data_schema)) = progress {
            let active = ActiveFlow {
                handler: handler.to_string(),
                source,
                progress: Mutex::new(FlowProgress {
                    flow,
                    step_id,
                    data_schema,
                }),
            };
            self.flows
                .write()
                .await
                .insert(flow_id.clone(), Arc::new(active));
        }

        Ok(result)
    }

    async fn progress_flow(
        &self,
        flow_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowResult, FlowError> {
        let active = self
            .flows
            .read()
            .await
            .get(flow_id)
            .cloned()
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        let mut progress = active.progress.lock().await;
        info!(
            "Progressing flow {} for {} at step {}",
            flow_id, active.handler, progress.step_id
        );

        let user_input = match user_input {
            Some(input) => match prepare_input(&progress.data_schema, input) {
                Ok(input) => Some(input),
                Err(e) => {
                    warn!("Rejected input for flow {}: {}", flow_id, e);
                    return Err(e);
                }
            },
            None => None,
        };

        let step_id = progress.step_id.clone();
        let versions = (progress.flow.version(), progress.flow.minor_version());
        let step = progress.flow.step(&step_id, user_input)?;

        if let FlowStep::Form {
            step_id,
            data_schema,
            ..
        } = &step
        {
            progress.step_id = step_id.clone();
            progress.data_schema = data_schema.clone();
        }
        let terminal = step.is_terminal();

        let result = self
            .finish_step(flow_id, &active.handler, active.source, versions, step)
            .await;

        drop(progress);
        if terminal {
            self.flows.write().await.remove(flow_id);
            debug!("Flow {} finished", flow_id);
        }

        result
    }

    async fn list_flows(&self) -> Vec<serde_json::Value> {
        let flows: Vec<(String, Arc<ActiveFlow>)> = self
            .flows
            .read()
            .await
            .iter()
            .map(|(id, flow)| (id.clone(), flow.clone()))
            .collect();

        let mut listed = Vec::with_capacity(flows.len());
        for (flow_id, flow) in flows {
            listed.push(flow.describe(&flow_id).await);
        }
        listed
    }
}
