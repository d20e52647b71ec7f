//! Paper platform - in-memory trading platform for dry runs
//!
//! Keeps inventories in memory and plays the receiving counterparty: it
//! echoes the ready handshake, readies up and acknowledges completed
//! hand-offs by emitting [`PlatformEvent`]s on an unbounded channel.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::signal::SessionSignals;
use crate::transport::{Transport, TransportResult};
use crate::types::{
    BotIdentity, InventoryItem, InventorySnapshot, PlatformEvent, TradeEvent, READY_MESSAGE,
};

/// Category consumed by crafting
pub const CRAFTABLE_CATEGORY: &str = "weapon";

/// Category produced by crafting two craftable items
pub const CRAFTED_CATEGORY: &str = "metal";

#[derive(Debug)]
struct PaperTrade {
    counterparty: BotIdentity,
    staged: Vec<InventoryItem>,
}

#[derive(Debug, Default)]
struct PaperState {
    inventories: HashMap<BotIdentity, Vec<InventoryItem>>,
    trades: HashMap<BotIdentity, PaperTrade>,
    online: HashSet<BotIdentity>,
    received: Vec<InventoryItem>,
}

/// In-memory platform that plays the receiving side of every trade
pub struct PaperPlatform {
    receiver: BotIdentity,
    state: Mutex<PaperState>,
    signals: DashMap<BotIdentity, SessionSignals>,
    events: mpsc::UnboundedSender<PlatformEvent>,
    next_item_id: AtomicU64,
}

impl PaperPlatform {
    /// Create a platform whose trades all go to `receiver`
    pub fn new(receiver: BotIdentity) -> (Arc<Self>, mpsc::UnboundedReceiver<PlatformEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let platform = Arc::new(Self {
            receiver,
            state: Mutex::new(PaperState::default()),
            signals: DashMap::new(),
            events,
            next_item_id: AtomicU64::new(1_000_000),
        });
        (platform, rx)
    }

    pub fn receiver(&self) -> BotIdentity {
        self.receiver
    }

    /// Give `bot` an inventory
    pub fn seed(&self, bot: BotIdentity, items: Vec<InventoryItem>) {
        self.lock().inventories.insert(bot, items);
    }

    /// Bring `bot` online and report the completed login
    pub fn login(&self, bot: BotIdentity) {
        self.lock().online.insert(bot);
        info!("Paper bot {} logged in", bot);
        self.emit(bot, TradeEvent::LoginCompleted);
    }

    pub fn is_online(&self, bot: BotIdentity) -> bool {
        self.lock().online.contains(&bot)
    }

    /// Open a trade window between `bot` and the receiver
    pub fn open_trade(&self, bot: BotIdentity) -> bool {
        {
            let mut state = self.lock();
            if !state.online.contains(&bot) || state.trades.contains_key(&bot) {
                return false;
            }
            state.trades.insert(
                bot,
                PaperTrade {
                    counterparty: self.receiver,
                    staged: Vec::new(),
                },
            );
        }

        self.signals_for(bot).trade.notify();
        self.emit(
            bot,
            TradeEvent::TradeInitiated {
                with: self.receiver,
            },
        );
        true
    }

    pub fn inventory(&self, bot: BotIdentity) -> Vec<InventoryItem> {
        self.lock().inventories.get(&bot).cloned().unwrap_or_default()
    }

    /// Items handed to the receiver so far
    pub fn received(&self) -> Vec<InventoryItem> {
        self.lock().received.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PaperState> {
        // A poisoned lock only means a test thread panicked mid-update
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn signals_for(&self, bot: BotIdentity) -> SessionSignals {
        self.signals.entry(bot).or_default().value().clone()
    }

    fn emit(&self, bot: BotIdentity, event: TradeEvent) {
        if self.events.send(PlatformEvent::new(bot, event)).is_err() {
            debug!("Paper event for bot {} dropped, nobody listening", bot);
        }
    }

    fn require_online(&self, state: &PaperState, bot: BotIdentity) -> TransportResult<()> {
        if state.online.contains(&bot) {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

#[async_trait]
impl Transport for PaperPlatform {
    async fn fetch_inventory(&self, bot: BotIdentity) -> TransportResult<InventorySnapshot> {
        let state = self.lock();
        self.require_online(&state, bot)?;
        let items = state.inventories.get(&bot).cloned().unwrap_or_default();
        Ok(InventorySnapshot::new(bot, items))
    }

    async fn craft_all(&self, bot: BotIdentity) -> TransportResult<()> {
        {
            let mut state = self.lock();
            self.require_online(&state, bot)?;
            let inventory = state.inventories.entry(bot).or_default();

            let (craftable, mut kept): (Vec<_>, Vec<_>) = inventory
                .drain(..)
                .partition(|item| item.category == CRAFTABLE_CATEGORY);
            let pairs = craftable.len() / 2;
            kept.extend(craftable.into_iter().skip(pairs * 2));
            for _ in 0..pairs {
                let id = self.next_item_id.fetch_add(1, Ordering::SeqCst);
                kept.push(InventoryItem::new(id, CRAFTED_CATEGORY));
            }
            *inventory = kept;
            debug!("Paper bot {} crafted {} items", bot, pairs);
        }

        self.signals_for(bot).inventory.notify();
        Ok(())
    }

    async fn send_chat_message(
        &self,
        bot: BotIdentity,
        to: BotIdentity,
        message: &str,
    ) -> TransportResult<()> {
        let state = self.lock();
        self.require_online(&state, bot)?;
        debug!("Paper chat {} -> {}: {}", bot, to, message);
        Ok(())
    }

    async fn stage_items(&self, bot: BotIdentity, items: &[InventoryItem]) -> TransportResult<usize> {
        let mut state = self.lock();
        let held: HashSet<u64> = state
            .inventories
            .get(&bot)
            .map(|inventory| inventory.iter().map(|item| item.id).collect())
            .unwrap_or_default();
        let trade = state
            .trades
            .get_mut(&bot)
            .ok_or(TransportError::NoActiveTrade)?;

        let mut staged = 0;
        for item in items {
            if held.contains(&item.id) && !trade.staged.contains(item) {
                trade.staged.push(item.clone());
                staged += 1;
            }
        }
        Ok(staged)
    }

    async fn send_application_message(&self, bot: BotIdentity, message: &str) -> TransportResult<()> {
        {
            let state = self.lock();
            if !state.trades.contains_key(&bot) {
                return Err(TransportError::NoActiveTrade);
            }
        }

        // The receiver answers the handshake in kind
        if message == READY_MESSAGE {
            self.emit(
                bot,
                TradeEvent::TradeMessage {
                    message: READY_MESSAGE.to_string(),
                },
            );
        }
        Ok(())
    }

    async fn set_local_ready(&self, bot: BotIdentity, ready: bool) -> TransportResult<()> {
        {
            let state = self.lock();
            if !state.trades.contains_key(&bot) {
                return Err(TransportError::NoActiveTrade);
            }
        }

        if ready {
            self.emit(bot, TradeEvent::TradeReady { ready: true });
        }
        Ok(())
    }

    async fn accept_trade(&self, bot: BotIdentity) -> TransportResult<()> {
        {
            let mut state = self.lock();
            let trade = state
                .trades
                .get_mut(&bot)
                .ok_or(TransportError::NoActiveTrade)?;
            if trade.staged.is_empty() {
                return Err(TransportError::rejected("accept_trade", "nothing staged"));
            }

            let staged = std::mem::take(&mut trade.staged);
            let counterparty = trade.counterparty;
            let moved: HashSet<u64> = staged.iter().map(|item| item.id).collect();
            if let Some(inventory) = state.inventories.get_mut(&bot) {
                inventory.retain(|item| !moved.contains(&item.id));
            }
            state.received.extend(staged);
            info!("Paper bot {} handed {} items to {}", bot, moved.len(), counterparty);
        }

        self.emit(bot, TradeEvent::TradeAccepted);
        Ok(())
    }

    async fn cancel_trade(&self, bot: BotIdentity) -> TransportResult<()> {
        let mut state = self.lock();
        let trade = state
            .trades
            .get_mut(&bot)
            .ok_or(TransportError::NoActiveTrade)?;
        trade.staged.clear();
        Ok(())
    }

    async fn close_trade(&self, bot: BotIdentity) -> TransportResult<()> {
        self.lock().trades.remove(&bot);
        Ok(())
    }

    async fn stop_bot(&self, bot: BotIdentity) -> TransportResult<()> {
        let mut state = self.lock();
        state.trades.remove(&bot);
        state.online.remove(&bot);
        info!("Paper bot {} logged off", bot);
        Ok(())
    }

    fn signals(&self, bot: BotIdentity) -> SessionSignals {
        self.signals_for(bot)
    }
}
