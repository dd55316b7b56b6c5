use deadpool_redis::{Config, Pool, PoolConfig, Runtime, Timeouts};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedisSetupError {
    #[error("failed to create Redis pool: {0}")]
    Pool(String),

    #[error("failed to connect to Redis: {0}")]
    Connection(String),
}

/// Connection settings for the shared Redis pool.
#[derive(Debug, Clone)]
pub struct RedisPoolSettings {
    pub url: String,
    pub pool_size: usize,
    pub timeout: Duration,
}

impl Default for RedisPoolSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            timeout: Duration::from_millis(5000),
        }
    }
}

/// Build a pool and check that Redis answers.
pub async fn connect(settings: &RedisPoolSettings) -> Result<Pool, RedisSetupError> {
    let mut timeouts = Timeouts::new();
    timeouts.wait = Some(settings.timeout);
    timeouts.create = Some(settings.timeout);
    timeouts.recycle = Some(settings.timeout);

    let mut pool_config = PoolConfig::new(settings.pool_size);
    pool_config.timeouts = timeouts;

    let mut config = Config::from_url(&settings.url);
    config.pool = Some(pool_config);

    let pool = config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| RedisSetupError::Pool(e.to_string()))?;

    pool.get()
        .await
        .map_err(|e| RedisSetupError::Connection(e.to_string()))?;

    tracing::info!(url = %settings.url, pool_size = settings.pool_size, "connected to Redis");
    Ok(pool)
}
