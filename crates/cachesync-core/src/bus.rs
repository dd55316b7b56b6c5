//! Invalidation bus contract and an in-process implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::coordinator::SyncCoordinator;
use crate::error::BusError;

/// Publish side of a pub/sub transport. Delivery to subscribers is the
/// transport's business; receiving is wired up by the transport's listener,
/// which calls [`SyncCoordinator::on_message`] for every payload.
#[async_trait]
pub trait InvalidationBus: Send + Sync {
    async fn send(&self, channel: &str, payload: String) -> Result<(), BusError>;
}

const CHANNEL_CAPACITY: usize = 1024;

/// Broadcast bus for coordinators living in the same process.
///
/// Every subscriber of a channel, including the sender's own, receives every
/// payload, the same as Redis pub/sub.
#[derive(Debug, Default)]
pub struct MemoryBus {
    channels: DashMap<String, broadcast::Sender<String>>,
    sent: AtomicU64,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender(channel).subscribe()
    }

    /// Total number of successful sends on any channel.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    /// Subscribe `coordinator` to its channel and feed it every payload on a
    /// background task.
    pub fn listen(&self, coordinator: Arc<SyncCoordinator>) -> JoinHandle<()> {
        let mut receiver = self.subscribe(coordinator.channel_name());
        tracing::info!(channel = %coordinator.channel_name(), "subscribed to in-memory invalidation channel");

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(payload) => {
                        coordinator.on_message(&payload).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "invalidation listener lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("in-memory invalidation channel closed");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl InvalidationBus for MemoryBus {
    async fn send(&self, channel: &str, payload: String) -> Result<(), BusError> {
        // No subscribers is not a failure for a broadcast transport.
        let _ = self.sender(channel).send(payload);
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let bus = MemoryBus::new();
        let mut a = bus.subscribe("prod:cache-invalidation");
        let mut b = bus.subscribe("prod:cache-invalidation");
        let mut other = bus.subscribe("staging:cache-invalidation");

        bus.send("prod:cache-invalidation", "hello".into())
            .await
            .unwrap();

        assert_eq!(a.recv().await.unwrap(), "hello");
        assert_eq!(b.recv().await.unwrap(), "hello");
        assert!(other.try_recv().is_err());
        assert_eq!(bus.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_send_without_subscribers_succeeds() {
        let bus = MemoryBus::new();
        bus.send("nobody", "x".into()).await.unwrap();
        assert_eq!(bus.sent_count(), 1);
    }
}
