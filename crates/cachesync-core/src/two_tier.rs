//! Two-tier cache: L1 (local, per instance) in front of L2 (distributed,
//! shared by all instances).
//!
//! ## Cache Hierarchy
//!
//! ```text
//! get → L1 → L2 → loader
//!        ↑    │
//!        └────┘ populate L1 on L2 hit
//! ```
//!
//! Writes go through both tiers, L1 first. Nothing is atomic across tiers.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

use crate::error::{CacheError, CacheResult};
use crate::tier::{CacheTier, CacheValue, TierKind};

pub struct TwoTierCache {
    name: String,
    local: Option<Arc<dyn CacheTier>>,
    distributed: Option<Arc<dyn CacheTier>>,
}

impl TwoTierCache {
    pub fn new(
        name: impl Into<String>,
        local: Option<Arc<dyn CacheTier>>,
        distributed: Option<Arc<dyn CacheTier>>,
    ) -> Self {
        Self {
            name: name.into(),
            local,
            distributed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The L1 tier, if this cache has one.
    pub fn local_tier(&self) -> Option<&Arc<dyn CacheTier>> {
        self.local.as_ref()
    }

    /// The L2 tier, if this cache has one.
    pub fn distributed_tier(&self) -> Option<&Arc<dyn CacheTier>> {
        self.distributed.as_ref()
    }

    /// Look up a value.
    ///
    /// ## Lookup Order
    ///
    /// 1. L1; a hit returns without touching L2
    /// 2. L2; a hit is copied into L1 before returning. A failed copy is
    ///    logged and the L2 value is still returned
    /// 3. `None`
    pub async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        if let Some(local) = &self.local {
            if let Some(value) = local.get(key).await? {
                tracing::debug!(cache = %self.name, key = %key, "cache hit (L1)");
                return Ok(Some(value));
            }
        }

        let Some(distributed) = &self.distributed else {
            tracing::debug!(cache = %self.name, key = %key, "cache miss");
            return Ok(None);
        };

        match distributed.get(key).await? {
            Some(value) => {
                tracing::debug!(cache = %self.name, key = %key, "cache hit (L2)");
                if let Some(local) = &self.local {
                    if let Err(e) = local.put(key, Arc::clone(&value)).await {
                        tracing::warn!(
                            cache = %self.name,
                            key = %key,
                            error = %e,
                            "failed to populate L1"
                        );
                    }
                }
                Ok(Some(value))
            }
            None => {
                tracing::debug!(cache = %self.name, key = %key, "cache miss");
                Ok(None)
            }
        }
    }

    /// Look up a value, running `loader` once on a full miss and writing its
    /// result through both tiers.
    ///
    /// A loader error is returned as [`CacheError::Load`] and nothing is
    /// written. Concurrent misses may each run their loader.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, loader: F) -> CacheResult<CacheValue>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue, E>>,
        E: Into<anyhow::Error>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = loader().await.map_err(|e| CacheError::Load(e.into()))?;
        self.put(key, Arc::clone(&value)).await?;
        Ok(value)
    }

    /// Write-through: L1 then L2, overwriting unconditionally.
    ///
    /// If the L2 write fails after L1 succeeded, the L1 entry is evicted again
    /// and the L2 error is returned.
    pub async fn put(&self, key: &str, value: CacheValue) -> CacheResult<()> {
        if let Some(local) = &self.local {
            local.put(key, Arc::clone(&value)).await?;
        }

        if let Some(distributed) = &self.distributed {
            if let Err(e) = distributed.put(key, value).await {
                tracing::warn!(cache = %self.name, key = %key, error = %e, "L2 write failed, rolling back L1");
                if let Some(local) = &self.local {
                    if let Err(rollback) = local.evict(key).await {
                        tracing::warn!(cache = %self.name, key = %key, error = %rollback, "L1 rollback failed");
                    }
                }
                return Err(e.into());
            }
        }

        Ok(())
    }

    /// Returns the existing value if there is one, otherwise writes and
    /// returns `None`. Two racing callers may both write; last one wins.
    pub async fn put_if_absent(
        &self,
        key: &str,
        value: CacheValue,
    ) -> CacheResult<Option<CacheValue>> {
        if let Some(existing) = self.get(key).await? {
            return Ok(Some(existing));
        }
        self.put(key, value).await?;
        Ok(None)
    }

    /// Remove a key from both tiers.
    pub async fn evict(&self, key: &str) -> CacheResult<()> {
        if let Some(local) = &self.local {
            local.evict(key).await?;
        }
        if let Some(distributed) = &self.distributed {
            distributed.evict(key).await?;
        }
        Ok(())
    }

    /// Remove every entry from both tiers.
    pub async fn clear(&self) -> CacheResult<()> {
        if let Some(local) = &self.local {
            local.clear().await?;
        }
        if let Some(distributed) = &self.distributed {
            distributed.clear().await?;
        }
        Ok(())
    }

    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(rmp_serde::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn put_as<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<()> {
        let bytes = rmp_serde::to_vec_named(value)?;
        self.put(key, Arc::new(bytes)).await
    }

    pub async fn get_or_load_as<T, F, Fut, E>(&self, key: &str, loader: F) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        if let Some(value) = self.get_as(key).await? {
            return Ok(value);
        }

        let value = loader().await.map_err(|e| CacheError::Load(e.into()))?;
        self.put_as(key, &value).await?;
        Ok(value)
    }

    /// Tier presence and type, for monitoring.
    pub fn info(&self) -> CacheInfo {
        let describe = |tier: &Arc<dyn CacheTier>| TierInfo {
            kind: tier.kind(),
            entries: tier.len_hint(),
        };
        CacheInfo {
            name: self.name.clone(),
            local: self.local.as_ref().map(describe),
            distributed: self.distributed.as_ref().map(describe),
        }
    }
}

impl std::fmt::Debug for TwoTierCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoTierCache")
            .field("name", &self.name)
            .field("local", &self.local.as_ref().map(|t| t.kind()))
            .field("distributed", &self.distributed.as_ref().map(|t| t.kind()))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierInfo {
    pub kind: TierKind,
    pub entries: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub name: String,
    pub local: Option<TierInfo>,
    pub distributed: Option<TierInfo>,
}
