//! Bot registry - process-wide view of which bots hold what and who may trade
//!
//! Every running session shares one registry. Per-identity operations take
//! the entry lock of the map they touch; the registered count is updated
//! inside the registration critical section so it never double counts.

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::types::{BotIdentity, InventoryItem};

/// Shared registry of bot items, authorized counterparties and ready bots
#[derive(Debug, Default)]
pub struct BotRegistry {
    items: DashMap<BotIdentity, Vec<InventoryItem>>,
    authorized: DashSet<BotIdentity>,
    ready: DashSet<BotIdentity>,
    stopped: DashSet<BotIdentity>,
    registered: AtomicUsize,
    expected: usize,
}

/// Point-in-time view of the registry for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub registered: usize,
    pub expected: usize,
    pub ready: Vec<BotIdentity>,
    pub stopped: Vec<BotIdentity>,
    pub items_held: usize,
}

impl BotRegistry {
    /// Create a registry expecting `expected` bots to check in
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            ..Default::default()
        }
    }

    /// Seed the globally trusted counterparties
    pub fn with_trusted<I>(self, trusted: I) -> Self
    where
        I: IntoIterator<Item = BotIdentity>,
    {
        for id in trusted {
            self.authorized.insert(id);
        }
        self
    }

    /// Register a bot's eligible items
    ///
    /// Returns false, leaving the registry untouched, when `id` is already
    /// registered. A registered bot is also an authorized counterparty.
    pub fn register(&self, id: BotIdentity, eligible: Vec<InventoryItem>) -> bool {
        match self.items.entry(id) {
            Entry::Occupied(_) => {
                debug!("Bot {} already registered", id);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(eligible);
                self.authorized.insert(id);
                self.registered.fetch_add(1, Ordering::SeqCst);
                true
            }
        }
    }

    /// Mark a registered bot as waiting to trade
    ///
    /// Unregistered identities are refused so `ready` stays a subset of the
    /// registered bots.
    pub fn mark_ready(&self, id: BotIdentity) -> bool {
        if !self.items.contains_key(&id) {
            debug!("Refusing to mark unregistered bot {} ready", id);
            return false;
        }
        self.ready.insert(id);
        true
    }

    /// Drop a bot from the ready set; true if it was there
    pub fn unmark(&self, id: BotIdentity) -> bool {
        self.ready.remove(&id).is_some()
    }

    /// Number of registered bots
    pub fn count(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }

    /// Number of bots the fleet expects to check in
    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn is_authorized(&self, id: BotIdentity) -> bool {
        self.authorized.contains(&id)
    }

    /// Allow `id` to request and accept trades
    pub fn authorize(&self, id: BotIdentity) {
        self.authorized.insert(id);
    }

    pub fn is_registered(&self, id: BotIdentity) -> bool {
        self.items.contains_key(&id)
    }

    pub fn is_ready(&self, id: BotIdentity) -> bool {
        self.ready.contains(&id)
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Identities currently waiting to trade
    pub fn ready_bots(&self) -> Vec<BotIdentity> {
        let mut bots: Vec<_> = self.ready.iter().map(|id| *id).collect();
        bots.sort();
        bots
    }

    /// Eligible items recorded at registration
    pub fn items_for(&self, id: BotIdentity) -> Option<Vec<InventoryItem>> {
        self.items.get(&id).map(|items| items.value().clone())
    }

    /// Claim the right to stop `id`; only the first caller gets true
    pub fn claim_stop(&self, id: BotIdentity) -> bool {
        self.stopped.insert(id)
    }

    pub fn is_stopped(&self, id: BotIdentity) -> bool {
        self.stopped.contains(&id)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut stopped: Vec<_> = self.stopped.iter().map(|id| *id).collect();
        stopped.sort();

        RegistrySnapshot {
            registered: self.count(),
            expected: self.expected,
            ready: self.ready_bots(),
            stopped,
            items_held: self.items.iter().map(|entry| entry.value().len()).sum(),
        }
    }
}
