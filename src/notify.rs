use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::LedgerEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for order-ledger mutations, one channel per product.
/// The recompute listener subscribes here.
pub struct NotifyHub {
    channels: DashMap<u64, broadcast::Sender<LedgerEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to ledger events for a product. Creates the channel if needed.
    pub fn subscribe(&self, product_id: u64) -> broadcast::Receiver<LedgerEvent> {
        let sender = self
            .channels
            .entry(product_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send an event. No-op if nobody is listening.
    pub fn send(&self, product_id: u64, event: &LedgerEvent) {
        if let Some(sender) = self.channels.get(&product_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when a product is deleted).
    #[allow(dead_code)]
    pub fn remove(&self, product_id: u64) {
        self.channels.remove(&product_id);
    }
}
