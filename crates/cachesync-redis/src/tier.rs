//! Redis-backed L2 tier.

use async_trait::async_trait;
use cachesync_core::{CacheTier, CacheValue, TierError, TierKind, TierProvider};
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

const SCAN_BATCH: usize = 500;

/// Cache name as it appears in a Redis key. `:` and `\` are backslash-escaped
/// so the first unescaped `::` always ends the name.
fn key_prefix(cache_name: &str) -> Cow<'_, str> {
    if !cache_name.contains([':', '\\']) {
        return Cow::Borrowed(cache_name);
    }
    let mut escaped = String::with_capacity(cache_name.len() + 4);
    for ch in cache_name.chars() {
        if matches!(ch, ':' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    Cow::Owned(escaped)
}

/// Key under which `key` of `cache_name` is stored: `"{cache}::{key}"`.
pub fn redis_key(cache_name: &str, key: &str) -> String {
    format!("{}::{key}", key_prefix(cache_name))
}

/// `MATCH` pattern covering every key of `cache_name` and nothing else.
pub fn cache_pattern(cache_name: &str) -> String {
    let prefix = key_prefix(cache_name);
    let mut escaped = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("{escaped}::*")
}

/// One named cache stored in Redis.
///
/// Every instance sharing the Redis server sees the same entries.
#[derive(Clone)]
pub struct RedisTier {
    pool: Pool,
    cache_name: String,
    ttl: Option<Duration>,
}

impl RedisTier {
    pub fn new(pool: Pool, cache_name: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            pool,
            cache_name: cache_name.into(),
            ttl,
        }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    async fn connection(&self) -> Result<Connection, TierError> {
        self.pool
            .get()
            .await
            .map_err(|e| TierError::backend(format!("failed to get Redis connection: {e}")))
    }
}

#[async_trait]
impl CacheTier for RedisTier {
    fn kind(&self) -> TierKind {
        TierKind::Redis
    }

    async fn get(&self, key: &str) -> Result<Option<CacheValue>, TierError> {
        let mut conn = self.connection().await?;
        let data: Option<Vec<u8>> = conn
            .get(redis_key(&self.cache_name, key))
            .await
            .map_err(|e| TierError::backend(format!("Redis GET error: {e}")))?;
        Ok(data.map(Arc::new))
    }

    async fn put(&self, key: &str, value: CacheValue) -> Result<(), TierError> {
        let mut conn = self.connection().await?;
        let redis_key = redis_key(&self.cache_name, key);

        let result: redis::RedisResult<()> = match self.ttl {
            Some(ttl) => conn.set_ex(&redis_key, value.as_slice(), ttl.as_secs().max(1)).await,
            None => conn.set(&redis_key, value.as_slice()).await,
        };
        result.map_err(|e| TierError::backend(format!("Redis SET error: {e}")))?;

        tracing::trace!(key = %redis_key, "cache set (redis)");
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<(), TierError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(redis_key(&self.cache_name, key))
            .await
            .map_err(|e| TierError::backend(format!("Redis DEL error: {e}")))
    }

    async fn clear(&self) -> Result<(), TierError> {
        let mut conn = self.connection().await?;
        let pattern = cache_pattern(&self.cache_name);
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| TierError::backend(format!("Redis SCAN error: {e}")))?;

            if !keys.is_empty() {
                removed += keys.len();
                conn.del::<_, ()>(&keys)
                    .await
                    .map_err(|e| TierError::backend(format!("Redis DEL error: {e}")))?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!(cache = %self.cache_name, removed, "cache cleared (redis)");
        Ok(())
    }
}

/// Hands out a [`RedisTier`] for any cache name, all sharing one pool.
#[derive(Clone)]
pub struct RedisTierProvider {
    pool: Pool,
    ttl: Option<Duration>,
}

impl RedisTierProvider {
    pub fn new(pool: Pool, ttl: Option<Duration>) -> Self {
        Self { pool, ttl }
    }
}

impl TierProvider for RedisTierProvider {
    fn create(&self, cache_name: &str) -> Option<Arc<dyn CacheTier>> {
        Some(Arc::new(RedisTier::new(
            self.pool.clone(),
            cache_name,
            self.ttl,
        )))
    }
}
