//! Wires tiers, transport and coordinator together from a [`NodeConfig`].

use cachesync_core::{
    CacheRegistry, CacheSyncAdmin, InvalidationBus, LocalTierProvider, MemoryBus, NoopMetrics,
    SyncCoordinator, SyncMetrics, TierProvider, TwoTierCache,
};
use cachesync_redis::{InvalidationListener, RedisBus, RedisTierProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::metrics::{PrometheusMetrics, init_metrics};

/// Where shared state and invalidations go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMode {
    /// Redis L2 plus Redis pub/sub.
    Redis,
    /// Local tier only, invalidations stay in-process.
    LocalOnly,
}

impl std::fmt::Display for NodeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeMode::Redis => write!(f, "redis"),
            NodeMode::LocalOnly => write!(f, "local"),
        }
    }
}

/// A running cachesync instance.
pub struct CacheSyncNode {
    mode: NodeMode,
    registry: Arc<CacheRegistry>,
    coordinator: Arc<SyncCoordinator>,
    admin: CacheSyncAdmin,
    listener: JoinHandle<()>,
}

impl CacheSyncNode {
    pub fn mode(&self) -> NodeMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    pub fn admin(&self) -> &CacheSyncAdmin {
        &self.admin
    }

    /// The named cache, created on first access.
    pub fn cache(&self, name: &str) -> Option<Arc<TwoTierCache>> {
        self.registry.get_or_create(name)
    }

    /// Stop receiving invalidations.
    pub fn shutdown(self) {
        self.listener.abort();
        tracing::info!(instance_id = %self.coordinator.instance_id(), "cache sync node stopped");
    }
}

/// Build a node from `config`.
///
/// With Redis enabled but unreachable the node starts in
/// [`NodeMode::LocalOnly`] instead of failing.
pub async fn start(config: &NodeConfig) -> anyhow::Result<CacheSyncNode> {
    config.validate().map_err(anyhow::Error::msg)?;

    let metrics: Arc<dyn SyncMetrics> = if config.metrics.prometheus {
        init_metrics();
        Arc::new(PrometheusMetrics)
    } else {
        Arc::new(NoopMetrics)
    };

    let local: Arc<dyn TierProvider> = Arc::new(LocalTierProvider::new(config.local_settings()));

    let pool = if config.redis.enabled {
        tracing::info!(url = %config.redis.url, "Connecting to Redis");
        match cachesync_redis::connect(&config.redis_pool_settings()).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to connect to Redis. Falling back to local cache."
                );
                None
            }
        }
    } else {
        tracing::info!("Redis disabled, using local cache only");
        None
    };

    let node = match pool {
        Some(pool) => {
            let ttl = Some(Duration::from_secs(config.redis.ttl_secs));
            let distributed: Arc<dyn TierProvider> =
                Arc::new(RedisTierProvider::new(pool.clone(), ttl));
            let registry = Arc::new(CacheRegistry::new(Some(local), Some(distributed)));
            let bus: Arc<dyn InvalidationBus> = Arc::new(RedisBus::new(pool));
            let coordinator = Arc::new(
                SyncCoordinator::new(config.sync_settings(), bus, registry.clone())
                    .with_metrics(metrics),
            );
            let listener =
                InvalidationListener::new(config.redis.url.clone(), coordinator.clone()).start();

            CacheSyncNode {
                mode: NodeMode::Redis,
                admin: CacheSyncAdmin::new(coordinator.clone()),
                registry,
                coordinator,
                listener,
            }
        }
        None => {
            let registry = Arc::new(CacheRegistry::new(Some(local), None));
            let bus = Arc::new(MemoryBus::new());
            let coordinator = Arc::new(
                SyncCoordinator::new(config.sync_settings(), bus.clone(), registry.clone())
                    .with_metrics(metrics),
            );
            let listener = bus.listen(coordinator.clone());

            CacheSyncNode {
                mode: NodeMode::LocalOnly,
                admin: CacheSyncAdmin::new(coordinator.clone()),
                registry,
                coordinator,
                listener,
            }
        }
    };

    tracing::info!(
        mode = %node.mode,
        instance_id = %node.coordinator.instance_id(),
        channel = %node.coordinator.channel_name(),
        "cache sync node started"
    );
    Ok(node)
}
