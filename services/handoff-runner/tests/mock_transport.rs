//! Recording Transport for driving sessions without a platform

#![allow(dead_code)]

use async_trait::async_trait;
use dashmap::DashMap;
use handoff_runner::{
    error::TransportError,
    signal::SessionSignals,
    transport::{Transport, TransportResult},
    types::{BotIdentity, InventoryItem, InventorySnapshot},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One outbound command as the mock saw it
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch(BotIdentity),
    Craft(BotIdentity),
    Chat {
        bot: BotIdentity,
        to: BotIdentity,
        message: String,
    },
    Stage {
        bot: BotIdentity,
        offered: usize,
    },
    AppMessage {
        bot: BotIdentity,
        message: String,
    },
    SetReady {
        bot: BotIdentity,
        ready: bool,
    },
    Accept(BotIdentity),
    Cancel(BotIdentity),
    Close(BotIdentity),
    Stop(BotIdentity),
}

/// Failure switches, all off by default
#[derive(Debug, Clone, Default)]
pub struct Knobs {
    /// `stage_items` reports zero items staged
    pub stage_nothing: bool,
    /// `accept_trade` returns an error
    pub fail_accept: bool,
    /// A failed accept still empties the inventory
    pub accept_drains_inventory: bool,
    pub fail_app_message: bool,
    pub fail_set_ready: bool,
    pub fail_fetch: bool,
    /// `craft_all` never acknowledges
    pub silent_craft: bool,
}

pub struct MockTransport {
    inventories: Mutex<HashMap<BotIdentity, Vec<InventoryItem>>>,
    calls: Mutex<Vec<Call>>,
    knobs: Mutex<Knobs>,
    signals: DashMap<BotIdentity, SessionSignals>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inventories: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            knobs: Mutex::new(Knobs::default()),
            signals: DashMap::new(),
        })
    }

    pub fn seed(&self, bot: BotIdentity, items: Vec<InventoryItem>) {
        self.inventories.lock().unwrap().insert(bot, items);
    }

    pub fn configure(&self, f: impl FnOnce(&mut Knobs)) {
        f(&mut self.knobs.lock().unwrap());
    }

    /// The platform opened a trade window for `bot`
    pub fn open_trade(&self, bot: BotIdentity) {
        self.signals_for(bot).trade.notify();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| pred(call)).count()
    }

    pub fn stops(&self, bot: BotIdentity) -> usize {
        self.count(|call| *call == Call::Stop(bot))
    }

    pub fn chats_to(&self, to: BotIdentity) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Chat {
                    to: target,
                    message,
                    ..
                } if target == to => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn knobs(&self) -> Knobs {
        self.knobs.lock().unwrap().clone()
    }

    fn signals_for(&self, bot: BotIdentity) -> SessionSignals {
        self.signals.entry(bot).or_default().value().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_inventory(&self, bot: BotIdentity) -> TransportResult<InventorySnapshot> {
        self.record(Call::Fetch(bot));
        if self.knobs().fail_fetch {
            return Err(TransportError::Disconnected);
        }
        let items = self
            .inventories
            .lock()
            .unwrap()
            .get(&bot)
            .cloned()
            .unwrap_or_default();
        Ok(InventorySnapshot::new(bot, items))
    }

    async fn craft_all(&self, bot: BotIdentity) -> TransportResult<()> {
        self.record(Call::Craft(bot));
        if !self.knobs().silent_craft {
            self.signals_for(bot).inventory.notify();
        }
        Ok(())
    }

    async fn send_chat_message(
        &self,
        bot: BotIdentity,
        to: BotIdentity,
        message: &str,
    ) -> TransportResult<()> {
        self.record(Call::Chat {
            bot,
            to,
            message: message.to_string(),
        });
        Ok(())
    }

    async fn stage_items(&self, bot: BotIdentity, items: &[InventoryItem]) -> TransportResult<usize> {
        self.record(Call::Stage {
            bot,
            offered: items.len(),
        });
        if self.knobs().stage_nothing {
            return Ok(0);
        }
        Ok(items.len())
    }

    async fn send_application_message(&self, bot: BotIdentity, message: &str) -> TransportResult<()> {
        self.record(Call::AppMessage {
            bot,
            message: message.to_string(),
        });
        if self.knobs().fail_app_message {
            return Err(TransportError::rejected("send_application_message", "trade gone"));
        }
        Ok(())
    }

    async fn set_local_ready(&self, bot: BotIdentity, ready: bool) -> TransportResult<()> {
        self.record(Call::SetReady { bot, ready });
        if self.knobs().fail_set_ready {
            return Err(TransportError::NoActiveTrade);
        }
        Ok(())
    }

    async fn accept_trade(&self, bot: BotIdentity) -> TransportResult<()> {
        self.record(Call::Accept(bot));
        let knobs = self.knobs();
        if knobs.fail_accept && !knobs.accept_drains_inventory {
            return Err(TransportError::rejected("accept_trade", "no response"));
        }

        self.inventories.lock().unwrap().insert(bot, Vec::new());
        if knobs.fail_accept {
            return Err(TransportError::rejected("accept_trade", "no response"));
        }
        Ok(())
    }

    async fn cancel_trade(&self, bot: BotIdentity) -> TransportResult<()> {
        self.record(Call::Cancel(bot));
        Ok(())
    }

    async fn close_trade(&self, bot: BotIdentity) -> TransportResult<()> {
        self.record(Call::Close(bot));
        Ok(())
    }

    async fn stop_bot(&self, bot: BotIdentity) -> TransportResult<()> {
        self.record(Call::Stop(bot));
        Ok(())
    }

    fn signals(&self, bot: BotIdentity) -> SessionSignals {
        self.signals_for(bot)
    }
}
