//! Redis pub/sub subscriber feeding a [`SyncCoordinator`].

use cachesync_core::{BusError, SyncCoordinator};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Delay before the reconnect attempt following one that waited `current`.
pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Subscribes to the coordinator's channel and hands every payload to
/// [`SyncCoordinator::on_message`].
///
/// ## How It Works
///
/// 1. Open a dedicated pub/sub connection (pooled connections cannot SUBSCRIBE)
/// 2. Subscribe to `<prefix><channel>`
/// 3. Process payloads one at a time, in arrival order
/// 4. Reconnect with exponential backoff (1s doubling to 5 minutes) on failure
pub struct InvalidationListener {
    redis_url: String,
    coordinator: Arc<SyncCoordinator>,
}

impl InvalidationListener {
    pub fn new(redis_url: impl Into<String>, coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            redis_url: redis_url.into(),
            coordinator,
        }
    }

    /// Spawn the subscription loop. Abort the handle to stop listening.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;

            loop {
                let Err(error) = self.run().await;
                match error {
                    BusError::StreamEnded => {
                        tracing::warn!(
                            channel = %self.coordinator.channel_name(),
                            "invalidation subscription closed, reconnecting"
                        );
                        backoff = INITIAL_BACKOFF;
                        tokio::time::sleep(backoff).await;
                    }
                    e => {
                        tracing::error!(
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "cache invalidation listener error, reconnecting..."
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = next_backoff(backoff);
                    }
                }
            }
        })
    }

    async fn run(&self) -> Result<Infallible, BusError> {
        let channel = self.coordinator.channel_name();

        let client = redis::Client::open(self.redis_url.as_str())
            .map_err(|e| BusError::Connection(format!("failed to create Redis client: {e}")))?;

        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| BusError::Connection(format!("failed to get pub/sub connection: {e}")))?;

        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;

        tracing::info!(
            channel = %channel,
            instance_id = %self.coordinator.instance_id(),
            "subscribed to invalidation channel"
        );

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            match msg.get_payload::<String>() {
                Ok(payload) => {
                    self.coordinator.on_message(&payload).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read invalidation payload");
                }
            }
        }

        Err(BusError::StreamEnded)
    }
}
