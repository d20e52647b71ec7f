//! Handoff Runner Library
//!
//! Coordinates a fleet of giving bots that each hand their eligible items
//! to an authorized counterparty over a trading platform.

pub mod agent;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod inventory;
pub mod paper;
pub mod registry;
pub mod runner;
pub mod session;
pub mod signal;
pub mod state;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export main types for convenience
pub use agent::{AgentReport, BotAgent, BotProfile, SessionRole, Verdict};
pub use crate::config::{BotInfo, Config, PaperAccount, PaperConfig};
pub use context::{SessionContext, SessionSettings};
pub use dispatcher::SessionDispatcher;
pub use error::{DispatchError, SessionError, TransportError};
pub use inventory::ItemFilter;
pub use paper::PaperPlatform;
pub use registry::{BotRegistry, RegistrySnapshot};
pub use runner::{FleetOutcome, FleetRunner};
pub use session::{SessionState, TradeSession};
pub use signal::{AckSignal, SessionSignals};
pub use transport::{Transport, TransportResult};
pub use types::{BotIdentity, InventoryItem, InventorySnapshot, PlatformEvent, TradeEvent};
