//! Single cache tier abstraction.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::error::TierError;

/// Cached values are opaque bytes, shared so hits are cheap to clone.
pub type CacheValue = Arc<Vec<u8>>;

/// Which storage a tier is backed by, for introspection only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    /// In-process bounded cache (moka)
    Local,
    /// In-process shared map
    Memory,
    /// Redis
    Redis,
}

impl std::fmt::Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TierKind::Local => write!(f, "local"),
            TierKind::Memory => write!(f, "memory"),
            TierKind::Redis => write!(f, "redis"),
        }
    }
}

/// One tier of a named cache.
///
/// Implementations own their thread-safety; the two-tier cache adds only
/// ordering between tiers.
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn kind(&self) -> TierKind;

    async fn get(&self, key: &str) -> Result<Option<CacheValue>, TierError>;

    async fn put(&self, key: &str, value: CacheValue) -> Result<(), TierError>;

    /// Removing an absent key is not an error.
    async fn evict(&self, key: &str) -> Result<(), TierError>;

    async fn clear(&self) -> Result<(), TierError>;

    /// Approximate number of entries, if the backend can tell cheaply.
    fn len_hint(&self) -> Option<u64> {
        None
    }
}

/// Builds the tier for a cache name on first access.
pub trait TierProvider: Send + Sync {
    fn create(&self, cache_name: &str) -> Option<Arc<dyn CacheTier>>;

    /// Cache names this provider knows about up front.
    fn known_names(&self) -> Vec<String> {
        Vec::new()
    }
}
