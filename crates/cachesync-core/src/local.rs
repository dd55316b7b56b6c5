//! Bounded in-process tier backed by moka.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TierError;
use crate::tier::{CacheTier, CacheValue, TierKind, TierProvider};

/// Size and expiry bounds for local tiers.
#[derive(Debug, Clone, Copy)]
pub struct LocalTierSettings {
    pub ttl: Duration,
    pub max_entries: u64,
}

impl Default for LocalTierSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 1000,
        }
    }
}

/// Per-instance L1 tier. Entries expire `ttl` after being written and the
/// tier holds at most `max_entries`.
pub struct LocalTier {
    entries: Cache<String, CacheValue>,
}

impl LocalTier {
    pub fn new(settings: LocalTierSettings) -> Self {
        let entries = Cache::builder()
            .max_capacity(settings.max_entries)
            .time_to_live(settings.ttl)
            .build();
        Self { entries }
    }
}

#[async_trait]
impl CacheTier for LocalTier {
    fn kind(&self) -> TierKind {
        TierKind::Local
    }

    async fn get(&self, key: &str) -> Result<Option<CacheValue>, TierError> {
        Ok(self.entries.get(key).await)
    }

    async fn put(&self, key: &str, value: CacheValue) -> Result<(), TierError> {
        self.entries.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<(), TierError> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), TierError> {
        self.entries.invalidate_all();
        Ok(())
    }

    fn len_hint(&self) -> Option<u64> {
        Some(self.entries.entry_count())
    }
}

/// Creates a fresh [`LocalTier`] for every cache name.
#[derive(Debug, Clone, Default)]
pub struct LocalTierProvider {
    settings: LocalTierSettings,
}

impl LocalTierProvider {
    pub fn new(settings: LocalTierSettings) -> Self {
        Self { settings }
    }
}

impl TierProvider for LocalTierProvider {
    fn create(&self, _cache_name: &str) -> Option<Arc<dyn CacheTier>> {
        Some(Arc::new(LocalTier::new(self.settings)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> CacheValue {
        Arc::new(s.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_put_get_evict() {
        let tier = LocalTier::new(LocalTierSettings::default());

        tier.put("k", value("v")).await.unwrap();
        assert_eq!(tier.get("k").await.unwrap(), Some(value("v")));

        tier.evict("k").await.unwrap();
        assert_eq!(tier.get("k").await.unwrap(), None);

        // absent key
        tier.evict("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_clear() {
        let tier = LocalTier::new(LocalTierSettings::default());
        tier.put("a", value("1")).await.unwrap();
        tier.put("b", value("2")).await.unwrap();

        tier.clear().await.unwrap();

        assert_eq!(tier.get("a").await.unwrap(), None);
        assert_eq!(tier.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let tier = LocalTier::new(LocalTierSettings {
            ttl: Duration::from_millis(50),
            max_entries: 10,
        });
        tier.put("k", value("v")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(tier.get("k").await.unwrap(), None);
    }

    #[test]
    fn test_provider_creates_independent_tiers() {
        let provider = LocalTierProvider::default();
        let a = provider.create("users").unwrap();
        let b = provider.create("users").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.kind(), TierKind::Local);
    }
}
