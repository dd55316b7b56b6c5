use async_trait::async_trait;
use cachesync_core::{BusError, InvalidationBus};
use deadpool_redis::Pool;
use redis::AsyncCommands;

/// Publishes invalidation payloads with Redis `PUBLISH`.
#[derive(Clone)]
pub struct RedisBus {
    pool: Pool,
}

impl RedisBus {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvalidationBus for RedisBus {
    async fn send(&self, channel: &str, payload: String) -> Result<(), BusError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;

        let receivers: u64 = conn
            .publish(channel, payload)
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;

        tracing::trace!(channel = %channel, receivers, "published to Redis");
        Ok(())
    }
}
