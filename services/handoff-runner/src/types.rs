//! Core types shared between the platform layer and the negotiation core
//!
//! These types define the contract between handoff-runner and whatever
//! transport delivers platform events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Application-level message that opens the ready handshake
pub const READY_MESSAGE: &str = "ready";

/// Chat notice sent to the counterparty when staging could not complete
pub const FAILED_NOTICE: &str = "failed";

/// Opaque handle for one bot account on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotIdentity(pub u64);

impl fmt::Display for BotIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BotIdentity {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// One item held by a bot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Platform item id
    pub id: u64,
    /// Category tag used for eligibility (e.g. "crate", "weapon")
    pub category: String,
}

impl InventoryItem {
    pub fn new(id: u64, category: impl Into<String>) -> Self {
        Self {
            id,
            category: category.into(),
        }
    }
}

/// Inventory of one bot at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub owner: BotIdentity,
    pub items: Vec<InventoryItem>,
    pub fetched_at: DateTime<Utc>,
}

impl InventorySnapshot {
    pub fn new(owner: BotIdentity, items: Vec<InventoryItem>) -> Self {
        Self {
            owner,
            items,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Events delivered by the platform for a single bot identity
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    /// The bot finished logging in
    LoginCompleted,
    /// Someone asked to add the bot as a friend
    FriendAddRequest { from: BotIdentity },
    /// Someone asked the bot to open a trade
    TradeRequest { from: BotIdentity },
    /// A trade window with `with` is open
    TradeInitiated { with: BotIdentity },
    /// The counterparty toggled its ready state
    TradeReady { ready: bool },
    /// Application-level message inside the trade
    TradeMessage { message: String },
    /// The counterparty acknowledged the completed hand-off
    TradeAccepted,
    /// The platform gave up waiting on the trade
    TradeTimeout,
    /// The platform reported a trade error
    TradeError { error: String },
    /// The trade window was closed
    TradeClosed,
    /// Plain chat, not part of the negotiation
    ChatMessage { from: BotIdentity, message: String },
}

impl TradeEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            TradeEvent::LoginCompleted => "login_completed",
            TradeEvent::FriendAddRequest { .. } => "friend_add_request",
            TradeEvent::TradeRequest { .. } => "trade_request",
            TradeEvent::TradeInitiated { .. } => "trade_initiated",
            TradeEvent::TradeReady { .. } => "trade_ready",
            TradeEvent::TradeMessage { .. } => "trade_message",
            TradeEvent::TradeAccepted => "trade_accepted",
            TradeEvent::TradeTimeout => "trade_timeout",
            TradeEvent::TradeError { .. } => "trade_error",
            TradeEvent::TradeClosed => "trade_closed",
            TradeEvent::ChatMessage { .. } => "chat_message",
        }
    }
}

/// An event addressed to one bot
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformEvent {
    pub bot: BotIdentity,
    pub event: TradeEvent,
}

impl PlatformEvent {
    pub fn new(bot: BotIdentity, event: TradeEvent) -> Self {
        Self { bot, event }
    }
}

/// Human-readable notice sent to the counterparty on a trade error
pub fn error_notice(reason: &str) -> String {
    format!("Oh, there was an error: {}.", reason)
}
