//! Outbound platform capabilities consumed by the negotiation core
//!
//! The network protocol itself lives behind this trait. Every command can
//! fail; callers branch on the error instead of retrying.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::signal::SessionSignals;
use crate::types::{BotIdentity, InventoryItem, InventorySnapshot};

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Commands a session may issue against the trading platform
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a fresh inventory snapshot
    async fn fetch_inventory(&self, bot: BotIdentity) -> TransportResult<InventorySnapshot>;

    /// Start crafting auxiliary items; completion is acknowledged on the
    /// bot's inventory signal
    async fn craft_all(&self, bot: BotIdentity) -> TransportResult<()>;

    /// Plain chat message to another account
    async fn send_chat_message(
        &self,
        bot: BotIdentity,
        to: BotIdentity,
        message: &str,
    ) -> TransportResult<()>;

    /// Put items into the open trade, returning how many were staged
    async fn stage_items(&self, bot: BotIdentity, items: &[InventoryItem]) -> TransportResult<usize>;

    /// Application-level message inside the open trade
    async fn send_application_message(&self, bot: BotIdentity, message: &str) -> TransportResult<()>;

    async fn set_local_ready(&self, bot: BotIdentity, ready: bool) -> TransportResult<()>;

    async fn accept_trade(&self, bot: BotIdentity) -> TransportResult<()>;

    async fn cancel_trade(&self, bot: BotIdentity) -> TransportResult<()>;

    /// Close the trade window; must be safe to call on a closed trade
    async fn close_trade(&self, bot: BotIdentity) -> TransportResult<()>;

    /// Log the bot out for good
    async fn stop_bot(&self, bot: BotIdentity) -> TransportResult<()>;

    /// Acknowledgment signals the platform raises for `bot`
    fn signals(&self, bot: BotIdentity) -> SessionSignals;
}
