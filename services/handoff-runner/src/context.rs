//! Shared collaborators handed to every session

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::inventory::ItemFilter;
use crate::registry::BotRegistry;
use crate::transport::{Transport, TransportResult};
use crate::types::{BotIdentity, InventoryItem};

/// Default wait for a platform acknowledgment
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Behaviour switches derived from configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Run the crafting step before the first inventory fetch
    pub auto_craft: bool,
    /// Bound on every acknowledgment wait
    pub ack_timeout: Duration,
    pub filter: ItemFilter,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auto_craft: false,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            filter: ItemFilter::default(),
        }
    }
}

/// Registry, transport and settings shared by all sessions of the process
pub struct SessionContext {
    pub registry: Arc<BotRegistry>,
    pub transport: Arc<dyn Transport>,
    pub settings: SessionSettings,
}

impl SessionContext {
    pub fn new(
        registry: Arc<BotRegistry>,
        transport: Arc<dyn Transport>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            registry,
            transport,
            settings,
        }
    }

    /// Fetch the live inventory and return its eligible items
    pub async fn live_items(&self, bot: BotIdentity) -> TransportResult<Vec<InventoryItem>> {
        info!("Bot {} getting inventory", bot);
        let snapshot = self.transport.fetch_inventory(bot).await?;
        Ok(self.settings.filter.filter(&snapshot))
    }

    /// Count eligible items in the live inventory
    pub async fn live_eligible(&self, bot: BotIdentity) -> TransportResult<usize> {
        self.live_items(bot).await.map(|items| items.len())
    }

    /// Stop `bot` unless some other path already did
    pub async fn stop_bot(&self, bot: BotIdentity) -> bool {
        if !self.registry.claim_stop(bot) {
            debug!("Bot {} already stopped", bot);
            return false;
        }

        info!("Stopping bot {}", bot);
        if let Err(e) = self.transport.stop_bot(bot).await {
            error!("Bot {} stop failed: {}", bot, e);
        }
        true
    }
}
