//! Acknowledgment signals from the platform layer
//!
//! The inventory and trade layers acknowledge asynchronous work (a crafting
//! pass landing in the inventory, a trade window opening) by bumping a
//! generation counter. Sessions remember the last generation they observed
//! and wait for a newer one, bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::error::TransportError;

/// Generation counter that one side bumps and the other side waits on
#[derive(Debug, Clone)]
pub struct AckSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl AckSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Acknowledge one unit of work
    pub fn notify(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Wait until the generation moves past `seen`
    ///
    /// Returns the generation observed. Acknowledgments that arrived before
    /// the call are picked up immediately.
    pub async fn wait_past(&self, seen: u64, timeout: Duration) -> Result<u64, TransportError> {
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|generation| *generation > seen)).await;

        match waited {
            Ok(Ok(generation)) => Ok(*generation),
            Ok(Err(_)) => Err(TransportError::Disconnected),
            Err(_) => {
                debug!("No acknowledgment past generation {} within {:?}", seen, timeout);
                Err(TransportError::AckTimeout)
            }
        }
    }
}

impl Default for AckSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Signals one bot's session waits on
#[derive(Debug, Clone, Default)]
pub struct SessionSignals {
    /// Inventory reflects the last crafting pass
    pub inventory: AckSignal,
    /// A trade window opened
    pub trade: AckSignal,
}

impl SessionSignals {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_resolves_on_notify() {
        let signal = AckSignal::new();
        let seen = signal.generation();

        let notifier = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            notifier.notify();
        });

        let generation = signal.wait_past(seen, Duration::from_secs(2)).await.unwrap();
        assert_eq!(generation, seen + 1);
    }

    #[tokio::test]
    async fn test_earlier_notify_is_not_lost() {
        let signal = AckSignal::new();
        signal.notify();

        // Generation 0 was seen before the notify arrived
        let generation = signal.wait_past(0, Duration::from_millis(50)).await.unwrap();
        assert_eq!(generation, 1);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let signal = AckSignal::new();
        signal.notify();

        let result = signal.wait_past(1, Duration::from_millis(20)).await;
        assert_eq!(result, Err(TransportError::AckTimeout));
    }
}
