//! Home Assistant Rust Server
//!
//! Loads `configuration.yaml` and the stored config entries from the config
//! directory, sets up the IGD integration and then feeds it discovery
//! events read from stdin, one JSON object per line:
//!
//! - a discovery descriptor (`udn`, `host`, `name`, `ssdp_description`)
//!   starts a discovery flow
//! - `{"flow_id": ..., "user_input": {...}}` answers the form of an open flow
//!
//! Each flow result is printed to stdout as a JSON line.

use anyhow::{Context, Result};
use ha_config::{load_yaml, Value};
use ha_config_entries::{ConfigEntries, ConfigFlowHandler, ConfigFlowManager, FlowResult, Storage};
use ha_igd::IgdData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const CONFIG_FILE: &str = "configuration.yaml";

/// The central Home Assistant instance
pub struct HomeAssistant {
    /// Durable config entries
    pub entries: Arc<ConfigEntries>,
    /// Config flows of all integrations
    pub flows: Arc<ConfigFlowManager>,
    /// IGD integration state
    pub igd: Arc<IgdData>,
}

impl HomeAssistant {
    /// Load configuration and entries from `config_dir` and set up integrations
    pub async fn new(config_dir: &Path) -> Result<Self> {
        let config = load_config(config_dir)?;

        let storage = Arc::new(Storage::new(config_dir));
        let entries = Arc::new(ConfigEntries::new(storage));
        entries
            .load()
            .await
            .context("Failed to load config entries")?;

        let flows = Arc::new(ConfigFlowManager::new(entries.clone()));
        let igd = ha_igd::setup(&config, &flows).context("Invalid igd configuration")?;

        Ok(Self {
            entries,
            flows,
            igd,
        })
    }

    /// Handle one line of input
    async fn handle_line(&self, line: &str) -> Result<FlowResult> {
        let message: serde_json::Value =
            serde_json::from_str(line).context("Input is not valid JSON")?;

        let result = match message.get("flow_id").and_then(serde_json::Value::as_str) {
            Some(flow_id) => {
                self.flows
                    .progress_flow(flow_id, message.get("user_input").cloned())
                    .await?
            }
            None => ha_igd::handle_discovery(&self.flows, message).await?,
        };
        Ok(result)
    }
}

/// Load `configuration.yaml`, treating a missing file as empty configuration
fn load_config(config_dir: &Path) -> Result<Value> {
    if !config_dir.join(CONFIG_FILE).exists() {
        info!("No {} in {}, using defaults", CONFIG_FILE, config_dir.display());
        return Ok(Value::Null);
    }
    load_yaml(config_dir, CONFIG_FILE).context("Failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; logs go to stderr so stdout stays machine-readable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    info!(
        "Starting Home Assistant (Rust) with config dir {}",
        config_dir.display()
    );

    let hass = HomeAssistant::new(&config_dir).await?;

    info!(
        "Home Assistant initialized with {} config entries, flows for {:?}",
        hass.entries.len(),
        hass.flows.flow_handlers()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match hass.handle_line(line).await {
                    Ok(result) => println!("{}", serde_json::to_string(&result)?),
                    Err(e) => warn!("Rejected input: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!(
        "Shutting down with {} discovered gateways",
        hass.igd.discovered.len()
    );

    Ok(())
}
