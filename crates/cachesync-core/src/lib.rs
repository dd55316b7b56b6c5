//! Two-tier caching with cross-instance invalidation.
//!
//! Every named cache has a fast per-instance L1 and a shared L2. Writes go
//! through both; evictions are published on a pub/sub channel so peers drop
//! their stale L1 copies.
//!
//! ```text
//! Instance A                        Instance B
//! ----------                        ----------
//! evict("users", "u1")
//!   ├─ L1 + L2 evicted
//!   └─ publish ───── channel ─────▶ on_message
//!                                     └─ L1 evicted (L2 already done)
//! ```

pub mod admin;
pub mod bus;
pub mod codec;
pub mod coordinator;
pub mod error;
pub mod local;
pub mod memory;
pub mod message;
pub mod metrics;
pub mod registry;
pub mod tier;
pub mod two_tier;

pub use admin::{AdminError, CacheSyncAdmin, HealthStatus, SyncInfo};
pub use bus::{InvalidationBus, MemoryBus};
pub use coordinator::{DEFAULT_CHANNEL, Delivery, SyncCoordinator, SyncSettings};
pub use error::{BusError, CacheError, CacheResult, PayloadError, SyncError, TierError};
pub use local::{LocalTier, LocalTierProvider, LocalTierSettings};
pub use memory::{CachedEntry, MemoryStore, MemoryTier};
pub use message::{CacheAction, CacheMessage, EvictionIntent};
pub use metrics::{CountingMetrics, NoopMetrics, SyncMetrics, SyncStats};
pub use registry::CacheRegistry;
pub use tier::{CacheTier, CacheValue, TierKind, TierProvider};
pub use two_tier::{CacheInfo, TierInfo, TwoTierCache};
