//! Fleet Configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::agent::{BotProfile, SessionRole};
use crate::context::SessionSettings;
use crate::inventory::{ItemFilter, DEFAULT_EXCLUDED_CATEGORY};
use crate::types::{BotIdentity, InventoryItem};

/// Environment prefix for overrides, e.g. `HANDOFF__AUTO_CRAFT_WEAPONS=true`
const ENV_PREFIX: &str = "HANDOFF";

/// Top-level fleet configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Globally trusted counterparties
    #[serde(default)]
    pub admins: Vec<BotIdentity>,
    pub bots: Vec<BotInfo>,
    #[serde(default)]
    pub auto_start_all_bots: bool,
    #[serde(default)]
    pub auto_craft_weapons: bool,
    /// Not supported; a fleet asking for it starts no bots
    #[serde(default)]
    pub use_separate_processes: bool,
    #[serde(default = "default_excluded_categories")]
    pub excluded_categories: Vec<String>,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_main_log_level")]
    pub main_log_level: String,
    /// Directory for state files
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Dry-run platform settings
    #[serde(default)]
    pub paper: Option<PaperConfig>,
}

/// One bot account
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotInfo {
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: SessionRole,
    /// Ignored when `auto_start_all_bots` is set
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
    /// Longest a negotiation may run, in seconds
    #[serde(default = "default_maximum_trade_time")]
    pub maximum_trade_time: u64,
    /// Longest silence inside a negotiation, in seconds
    #[serde(default = "default_maximum_action_gap")]
    pub maximum_action_gap: u64,
}

impl BotInfo {
    pub fn profile(&self) -> BotProfile {
        BotProfile {
            action_gap: Duration::from_secs(self.maximum_action_gap),
            trade_deadline: Duration::from_secs(self.maximum_trade_time),
        }
    }
}

/// Paper platform seed data
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaperConfig {
    /// Identity of the receiving counterparty
    pub receiver: BotIdentity,
    /// Identity and inventory per bot, matched by username
    #[serde(default)]
    pub accounts: Vec<PaperAccount>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaperAccount {
    pub username: String,
    pub identity: BotIdentity,
    #[serde(default)]
    pub items: Vec<InventoryItem>,
}

impl Config {
    /// Load from a settings file layered with `HANDOFF__*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = settings
            .try_deserialize()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the runner cannot start
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bots.is_empty() {
            anyhow::bail!("No bots configured");
        }
        if self.ack_timeout_ms == 0 {
            anyhow::bail!("ack_timeout_ms must be greater than zero");
        }

        let mut seen = HashSet::new();
        for bot in &self.bots {
            if !seen.insert(bot.username.as_str()) {
                anyhow::bail!("Duplicate bot username: {}", bot.username);
            }
            if bot.maximum_action_gap == 0 || bot.maximum_trade_time == 0 {
                anyhow::bail!("Bot {} needs non-zero trade time limits", bot.username);
            }
        }
        Ok(())
    }

    /// Bots that start when the runner starts
    pub fn starting_bots(&self) -> impl Iterator<Item = &BotInfo> {
        self.bots
            .iter()
            .filter(move |bot| self.auto_start_all_bots || bot.auto_start)
    }

    /// Number of bots expected to check in
    pub fn total_bots(&self) -> usize {
        if self.use_separate_processes {
            return 0;
        }
        self.starting_bots().count()
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Settings handed to every session
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            auto_craft: self.auto_craft_weapons,
            ack_timeout: self.ack_timeout(),
            filter: ItemFilter::new(&self.excluded_categories),
        }
    }

    pub fn log_level(&self) -> tracing::Level {
        self.main_log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

fn default_excluded_categories() -> Vec<String> {
    vec![DEFAULT_EXCLUDED_CATEGORY.to_string()]
}
fn default_ack_timeout_ms() -> u64 { 5_000 }
fn default_main_log_level() -> String { "info".to_string() }
fn default_state_dir() -> String { ".".to_string() }
fn default_auto_start() -> bool { true }
fn default_maximum_trade_time() -> u64 { 180 }
fn default_maximum_action_gap() -> u64 { 30 }
