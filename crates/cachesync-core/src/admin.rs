//! Administrative operations for a monitoring surface.
//!
//! An admin caller is authoritative: evictions and clears are applied to the
//! full two-tier cache here, then published so peers drop their L1 copies.
//! L2 is always updated before the message goes out.

use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::coordinator::{SyncCoordinator, SyncSettings};
use crate::error::CacheError;
use crate::message::{CacheAction, EvictionIntent};
use crate::two_tier::{CacheInfo, TwoTierCache};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Cache not found: {name}")]
    CacheNotFound { name: String, available: Vec<String> },

    #[error("No keys provided for eviction")]
    NoKeys,

    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Up,
    Disabled,
    NoCaches,
    InvalidChannel,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Disabled => "DISABLED",
            HealthStatus::NoCaches => "WARNING: No caches configured",
            HealthStatus::InvalidChannel => "ERROR: Invalid channel configuration",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HealthStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvictReport {
    pub cache_name: String,
    pub keys_evicted: usize,
    pub keys: Vec<String>,
    pub published_at: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub cache_name: String,
    pub action: CacheAction,
    pub published_at: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearAllReport {
    pub caches_cleared: usize,
    pub cache_names: Vec<String>,
    pub published_at: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CachesReport {
    pub count: usize,
    pub names: Vec<String>,
    pub details: Vec<CacheInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    pub instance_id: String,
    pub channel: String,
    pub startup_time: String,
    pub uptime: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInfo {
    pub instance: InstanceInfo,
    pub configuration: SyncSettings,
    pub caches: Vec<CacheInfo>,
    pub cache_count: usize,
    pub status: HealthStatus,
}

pub struct CacheSyncAdmin {
    coordinator: Arc<SyncCoordinator>,
    started_at: OffsetDateTime,
    started: Instant,
}

impl CacheSyncAdmin {
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            coordinator,
            started_at: OffsetDateTime::now_utc(),
            started: Instant::now(),
        }
    }

    fn find(&self, cache_name: &str) -> Result<Arc<TwoTierCache>, AdminError> {
        let registry = self.coordinator.registry();
        registry
            .get_existing(cache_name)
            .ok_or_else(|| AdminError::CacheNotFound {
                name: cache_name.to_string(),
                available: registry.names().into_iter().collect(),
            })
    }

    /// Evict `keys` from `cache_name` here and on every peer.
    pub async fn evict(
        &self,
        cache_name: &str,
        keys: Vec<String>,
    ) -> Result<EvictReport, AdminError> {
        let cache = self.find(cache_name)?;
        if keys.is_empty() {
            return Err(AdminError::NoKeys);
        }

        for key in &keys {
            cache.evict(key).await?;
        }
        self.coordinator
            .publish(EvictionIntent::evict(cache_name, keys.iter().cloned()))
            .await;

        tracing::info!(cache = %cache_name, keys = keys.len(), "manual eviction triggered");

        Ok(EvictReport {
            cache_name: cache_name.to_string(),
            keys_evicted: keys.len(),
            keys,
            published_at: now_rfc3339(),
            instance_id: self.coordinator.instance_id().to_string(),
        })
    }

    /// Clear `cache_name` here and on every peer.
    pub async fn clear(&self, cache_name: &str) -> Result<ClearReport, AdminError> {
        let cache = self.find(cache_name)?;

        cache.clear().await?;
        self.coordinator
            .publish(EvictionIntent::clear(cache_name))
            .await;

        tracing::warn!(cache = %cache_name, "manual cache clear triggered");

        Ok(ClearReport {
            cache_name: cache_name.to_string(),
            action: CacheAction::Clear,
            published_at: now_rfc3339(),
            instance_id: self.coordinator.instance_id().to_string(),
        })
    }

    /// Clear every registered cache here and on every peer.
    pub async fn clear_all(&self) -> Result<ClearAllReport, AdminError> {
        let registry = self.coordinator.registry();
        let mut cleared = Vec::new();

        for name in registry.names() {
            let Some(cache) = registry.get_existing(&name) else {
                continue;
            };
            cache.clear().await?;
            self.coordinator.publish(EvictionIntent::clear(&name)).await;
            cleared.push(name);
        }

        tracing::warn!(caches = cleared.len(), "manual clear-all triggered");

        Ok(ClearAllReport {
            caches_cleared: cleared.len(),
            cache_names: cleared,
            published_at: now_rfc3339(),
            instance_id: self.coordinator.instance_id().to_string(),
        })
    }

    pub fn caches(&self) -> CachesReport {
        let registry = self.coordinator.registry();
        let names: Vec<String> = registry.names().into_iter().collect();
        CachesReport {
            count: names.len(),
            names,
            details: registry.infos(),
        }
    }

    pub fn health(&self) -> HealthStatus {
        if !self.coordinator.is_enabled() {
            return HealthStatus::Disabled;
        }
        if self.coordinator.registry().is_empty() {
            return HealthStatus::NoCaches;
        }
        if self.coordinator.settings().channel.trim().is_empty() {
            return HealthStatus::InvalidChannel;
        }
        HealthStatus::Up
    }

    pub fn info(&self) -> SyncInfo {
        let caches = self.coordinator.registry().infos();
        SyncInfo {
            instance: InstanceInfo {
                instance_id: self.coordinator.instance_id().to_string(),
                channel: self.coordinator.channel_name().to_string(),
                startup_time: self.started_at.format(&Rfc3339).unwrap_or_default(),
                uptime: format_uptime(self.started.elapsed()),
            },
            configuration: self.coordinator.settings().clone(),
            cache_count: caches.len(),
            caches,
            status: self.health(),
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// `"3d 2h 5m"`, `"2h 5m 3s"`, `"5m 3s"` or `"3s"`.
pub fn format_uptime(uptime: Duration) -> String {
    let seconds = uptime.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h {}m", days, hours % 24, minutes % 60)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::codec;
    use crate::memory::MemoryTier;
    use crate::registry::CacheRegistry;
    use crate::TierError;
    use crate::tier::{CacheTier, CacheValue, TierKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Fixture {
        bus: Arc<MemoryBus>,
        l1: Arc<MemoryTier>,
        l2: Arc<MemoryTier>,
        admin: CacheSyncAdmin,
    }

    fn fixture(settings: SyncSettings) -> Fixture {
        let bus = Arc::new(MemoryBus::new());
        let l1 = Arc::new(MemoryTier::default());
        let l2 = Arc::new(MemoryTier::default());
        let registry = Arc::new(CacheRegistry::empty());
        registry.register(TwoTierCache::new(
            "users",
            Some(l1.clone() as _),
            Some(l2.clone() as _),
        ));
        let coordinator = Arc::new(SyncCoordinator::new(settings, bus.clone(), registry));
        Fixture {
            bus,
            l1,
            l2,
            admin: CacheSyncAdmin::new(coordinator),
        }
    }

    #[tokio::test]
    async fn test_evict_applies_both_tiers_and_publishes() {
        let f = fixture(SyncSettings::default());
        let mut rx = f.bus.subscribe("cache-invalidation");
        f.l1.put("user:1", Arc::new(vec![1])).await.unwrap();
        f.l2.put("user:1", Arc::new(vec![1])).await.unwrap();

        let report = f
            .admin
            .evict("users", vec!["user:1".into(), "user:2".into()])
            .await
            .unwrap();

        assert_eq!(report.keys_evicted, 2);
        assert!(!f.l1.contains("user:1"));
        assert!(!f.l2.contains("user:1"));

        let msg = codec::decode(&rx.recv().await.unwrap(), false).unwrap();
        assert_eq!(msg.action, CacheAction::Evict);
        assert_eq!(msg.keys.len(), 2);
    }

    /// L2 that records how many messages were already on the bus when it
    /// was asked to evict or clear.
    struct OrderingTier {
        inner: MemoryTier,
        bus: Arc<MemoryBus>,
        sent_before_write: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl CacheTier for OrderingTier {
        fn kind(&self) -> TierKind {
            self.inner.kind()
        }

        async fn get(&self, key: &str) -> Result<Option<CacheValue>, TierError> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: CacheValue) -> Result<(), TierError> {
            self.inner.put(key, value).await
        }

        async fn evict(&self, key: &str) -> Result<(), TierError> {
            self.sent_before_write.lock().unwrap().push(self.bus.sent_count());
            self.inner.evict(key).await
        }

        async fn clear(&self) -> Result<(), TierError> {
            self.sent_before_write.lock().unwrap().push(self.bus.sent_count());
            self.inner.clear().await
        }
    }

    #[tokio::test]
    async fn test_l2_is_updated_before_publishing() {
        let bus = Arc::new(MemoryBus::new());
        let l2 = Arc::new(OrderingTier {
            inner: MemoryTier::default(),
            bus: bus.clone(),
            sent_before_write: Default::default(),
        });
        let registry = Arc::new(CacheRegistry::empty());
        registry.register(TwoTierCache::new(
            "countries",
            Some(Arc::new(MemoryTier::default()) as _),
            Some(l2.clone() as _),
        ));
        let admin = CacheSyncAdmin::new(Arc::new(SyncCoordinator::new(
            SyncSettings::default(),
            bus.clone(),
            registry,
        )));

        admin.evict("countries", vec!["KE".into()]).await.unwrap();
        admin.clear("countries").await.unwrap();
        admin.clear_all().await.unwrap();

        assert_eq!(*l2.sent_before_write.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(bus.sent_count(), 3);
    }

    #[tokio::test]
    async fn test_evict_validation() {
        let f = fixture(SyncSettings::default());

        match f.admin.evict("orders", vec!["1".into()]).await {
            Err(AdminError::CacheNotFound { name, available }) => {
                assert_eq!(name, "orders");
                assert_eq!(available, vec!["users".to_string()]);
            }
            other => panic!("expected CacheNotFound, got {other:?}"),
        }

        assert!(matches!(
            f.admin.evict("users", vec![]).await,
            Err(AdminError::NoKeys)
        ));
        assert_eq!(f.bus.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_and_clear_all() {
        let f = fixture(SyncSettings::default());
        f.l1.put("a", Arc::new(vec![1])).await.unwrap();
        f.l2.put("a", Arc::new(vec![1])).await.unwrap();

        let report = f.admin.clear("users").await.unwrap();
        assert_eq!(report.action, CacheAction::Clear);
        assert_eq!(f.l1.len_hint(), Some(0));
        assert_eq!(f.l2.len_hint(), Some(0));

        let report = f.admin.clear_all().await.unwrap();
        assert_eq!(report.cache_names, vec!["users".to_string()]);
        assert_eq!(f.bus.sent_count(), 2);
    }

    #[test]
    fn test_info_and_health() {
        let f = fixture(SyncSettings {
            channel_prefix: "prod:".into(),
            ..Default::default()
        });

        let info = f.admin.info();
        assert_eq!(info.instance.channel, "prod:cache-invalidation");
        assert_eq!(info.cache_count, 1);
        assert_eq!(info.status, HealthStatus::Up);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["status"], "UP");
        assert_eq!(json["caches"][0]["local"]["kind"], "memory");

        let disabled = fixture(SyncSettings {
            enabled: false,
            ..Default::default()
        });
        assert_eq!(disabled.admin.health(), HealthStatus::Disabled);

        let blank = fixture(SyncSettings {
            channel: " ".into(),
            ..Default::default()
        });
        assert_eq!(blank.admin.health(), HealthStatus::InvalidChannel);
    }

    #[test]
    fn test_health_without_caches() {
        let coordinator = Arc::new(SyncCoordinator::new(
            SyncSettings::default(),
            Arc::new(MemoryBus::new()),
            Arc::new(CacheRegistry::empty()),
        ));
        let admin = CacheSyncAdmin::new(coordinator);
        assert_eq!(admin.health(), HealthStatus::NoCaches);
        assert_eq!(admin.caches().count, 0);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(3)), "3s");
        assert_eq!(format_uptime(Duration::from_secs(5 * 60 + 3)), "5m 3s");
        assert_eq!(format_uptime(Duration::from_secs(2 * 3600 + 5 * 60 + 3)), "2h 5m 3s");
        assert_eq!(
            format_uptime(Duration::from_secs(3 * 86400 + 2 * 3600 + 5 * 60)),
            "3d 2h 5m"
        );
    }
}
