//! Name → [`TwoTierCache`] lookup.

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::tier::TierProvider;
use crate::two_tier::{CacheInfo, TwoTierCache};

/// Lazily populated registry of named caches.
///
/// Each tier provider is asked for a tier the first time a name is
/// requested; the resulting cache lives for the rest of the process.
pub struct CacheRegistry {
    caches: DashMap<String, Arc<TwoTierCache>>,
    local: Option<Arc<dyn TierProvider>>,
    distributed: Option<Arc<dyn TierProvider>>,
}

impl CacheRegistry {
    pub fn new(
        local: Option<Arc<dyn TierProvider>>,
        distributed: Option<Arc<dyn TierProvider>>,
    ) -> Self {
        Self {
            caches: DashMap::new(),
            local,
            distributed,
        }
    }

    /// A registry that only holds explicitly registered caches.
    pub fn empty() -> Self {
        Self::new(None, None)
    }

    /// Get the cache for `name`, creating it on first access.
    ///
    /// Concurrent first accesses observe the same instance. Returns `None`
    /// when no provider yields a tier for the name.
    pub fn get_or_create(&self, name: &str) -> Option<Arc<TwoTierCache>> {
        if let Some(existing) = self.caches.get(name) {
            return Some(Arc::clone(existing.value()));
        }

        let local = self.local.as_ref().and_then(|p| p.create(name));
        let distributed = self.distributed.as_ref().and_then(|p| p.create(name));
        if local.is_none() && distributed.is_none() {
            return None;
        }

        // The entry lock decides the winner if another caller raced us here.
        let cache = self
            .caches
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(cache = %name, "created two-tier cache");
                Arc::new(TwoTierCache::new(name, local, distributed))
            })
            .clone();
        Some(cache)
    }

    /// The cache for `name` only if it already exists.
    pub fn get_existing(&self, name: &str) -> Option<Arc<TwoTierCache>> {
        self.caches.get(name).map(|c| Arc::clone(c.value()))
    }

    /// Add a pre-built cache, replacing any previous cache of the same name.
    pub fn register(&self, cache: TwoTierCache) -> Arc<TwoTierCache> {
        let cache = Arc::new(cache);
        self.caches
            .insert(cache.name().to_string(), Arc::clone(&cache));
        cache
    }

    /// Names of every cache created so far.
    pub fn names(&self) -> BTreeSet<String> {
        self.caches.iter().map(|e| e.key().clone()).collect()
    }

    /// Create caches for every name the providers already know about.
    pub fn preload(&self) -> usize {
        let mut names = BTreeSet::new();
        for provider in [&self.local, &self.distributed].into_iter().flatten() {
            names.extend(provider.known_names());
        }
        names
            .iter()
            .filter(|name| self.get_or_create(name).is_some())
            .count()
    }

    pub fn infos(&self) -> Vec<CacheInfo> {
        let mut infos: Vec<CacheInfo> = self.caches.iter().map(|e| e.value().info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}
