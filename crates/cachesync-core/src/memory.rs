//! Shared in-process tier.
//!
//! A [`MemoryStore`] hands out one [`MemoryTier`] per cache name, so several
//! coordinators in the same process can share it the way separate instances
//! share Redis. Used for single-node deployments and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::TierError;
use crate::tier::{CacheTier, CacheValue, TierKind, TierProvider};

/// A cached entry with optional TTL.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: CacheValue,
    pub cached_at: Instant,
    pub ttl: Option<Duration>,
}

impl CachedEntry {
    pub fn new(data: CacheValue, ttl: Option<Duration>) -> Self {
        Self {
            data,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| self.cached_at.elapsed() > ttl)
    }
}

/// DashMap-backed tier with lazy expiry.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: DashMap<String, CachedEntry>,
    ttl: Option<Duration>,
}

impl MemoryTier {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Whether the key is present and live, without touching read paths.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    async fn get(&self, key: &str) -> Result<Option<CacheValue>, TierError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(Arc::clone(&entry.data)));
            }
            drop(entry);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: CacheValue) -> Result<(), TierError> {
        self.entries
            .insert(key.to_string(), CachedEntry::new(value, self.ttl));
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<(), TierError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), TierError> {
        self.entries.clear();
        Ok(())
    }

    fn len_hint(&self) -> Option<u64> {
        Some(self.entries.len() as u64)
    }
}

/// Named [`MemoryTier`]s shared by every holder of the store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tiers: Arc<DashMap<String, Arc<MemoryTier>>>,
    ttl: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tiers: Arc::new(DashMap::new()),
            ttl: Some(ttl),
        }
    }

    /// The tier for `cache_name`, created on first use.
    pub fn tier(&self, cache_name: &str) -> Arc<MemoryTier> {
        self.tiers
            .entry(cache_name.to_string())
            .or_insert_with(|| Arc::new(MemoryTier::new(self.ttl)))
            .clone()
    }
}

impl TierProvider for MemoryStore {
    fn create(&self, cache_name: &str) -> Option<Arc<dyn CacheTier>> {
        Some(self.tier(cache_name))
    }

    fn known_names(&self) -> Vec<String> {
        self.tiers.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[tokio::test]
    async fn test_store_shares_tier_per_name() {
        let store = MemoryStore::new();
        let a = store.create("countries").unwrap();
        let b = store.clone().create("countries").unwrap();

        a.put("KE", Arc::new(b"Kenya".to_vec())).await.unwrap();
        assert_eq!(b.get("KE").await.unwrap(), Some(Arc::new(b"Kenya".to_vec())));
        assert_eq!(store.known_names(), vec!["countries".to_string()]);
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed_on_read() {
        let tier = MemoryTier::new(Some(Duration::from_millis(20)));
        tier.put("k", Arc::new(vec![1])).await.unwrap();
        assert!(tier.contains("k"));

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!tier.contains("k"));
        assert_eq!(tier.get("k").await.unwrap(), None);
        assert_eq!(tier.len_hint(), Some(0));
    }

    #[test]
    fn test_evict_and_clear_are_idempotent() {
        let tier = MemoryTier::default();
        block_on(async {
            tier.evict("missing").await.unwrap();
            tier.clear().await.unwrap();
            tier.clear().await.unwrap();
        });
        assert_eq!(tier.len_hint(), Some(0));
    }
}
