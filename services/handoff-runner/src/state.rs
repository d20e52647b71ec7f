//! State Management - Write fleet state files for observability

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::agent::AgentReport;
use crate::registry::RegistrySnapshot;

/// Manages state files for observability
pub struct StateManager {
    state_dir: PathBuf,
}

/// Fleet status (state/fleet.json)
#[derive(Debug, Clone, Serialize)]
pub struct FleetState {
    pub timestamp: String,
    pub status: String,
    pub registry: RegistrySnapshot,
    pub bots: Vec<AgentReport>,
    pub items_received: usize,
}

/// Counters read back from a previous run's fleet.json
#[derive(Debug, Clone, Deserialize)]
pub struct FleetSummary {
    pub status: String,
    pub items_received: usize,
}

impl FleetState {
    pub fn new(
        status: &str,
        registry: RegistrySnapshot,
        bots: Vec<AgentReport>,
        items_received: usize,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            status: status.to_string(),
            registry,
            bots,
            items_received,
        }
    }
}

impl StateManager {
    pub fn new(workspace_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: workspace_dir.as_ref().join("state"),
        }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.state_dir).await?;
        Ok(())
    }

    pub fn fleet_path(&self) -> PathBuf {
        self.state_dir.join("fleet.json")
    }

    pub async fn write_fleet(&self, state: &FleetState) -> anyhow::Result<()> {
        let path = self.fleet_path();
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&path, json).await?;
        debug!("Wrote state/fleet.json");
        Ok(())
    }

    pub async fn read_summary(&self) -> anyhow::Result<FleetSummary> {
        let json = fs::read_to_string(self.fleet_path()).await?;
        Ok(serde_json::from_str(&json)?)
    }
}
