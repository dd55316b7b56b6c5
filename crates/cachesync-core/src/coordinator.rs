//! Cross-instance invalidation.
//!
//! ## How It Works
//!
//! ```text
//! Instance A: publish(evict "countries"/"KE")
//!   ↓ stamp originId = A, encode, send on "<prefix><channel>"
//! Bus: every subscriber receives the payload (A included)
//!   ↓
//! Instance A: originId == self → ignored
//! Instance B: decode → registry lookup → evict "KE" from L1 only
//! ```
//!
//! ## Loop Prevention
//!
//! 1. Origin id: an instance drops messages it published itself.
//! 2. Task-local flag: while a remote message is being applied, `publish`
//!    on the same task is a no-op, so tier hooks that react to evictions
//!    cannot echo the message back onto the bus.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::bus::InvalidationBus;
use crate::codec;
use crate::error::{SyncError, TierError};
use crate::message::{CacheAction, CacheMessage, EvictionIntent};
use crate::metrics::{NoopMetrics, SyncMetrics};
use crate::registry::CacheRegistry;
use crate::tier::CacheTier;

tokio::task_local! {
    static APPLYING_REMOTE: bool;
}

/// Base channel used when none is configured.
pub const DEFAULT_CHANNEL: &str = "cache-invalidation";

/// Per-deployment synchronization settings.
///
/// Peers must agree on `compress_messages`; deployments that differ should
/// use different channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSettings {
    pub enabled: bool,
    pub channel_prefix: String,
    pub channel: String,
    pub compress_messages: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_prefix: String::new(),
            channel: DEFAULT_CHANNEL.to_string(),
            compress_messages: false,
        }
    }
}

impl SyncSettings {
    /// `prefix + channel`, e.g. `"prod:" + "cache-invalidation"`.
    pub fn channel_name(&self) -> String {
        format!("{}{}", self.channel_prefix, self.channel)
    }
}

/// Terminal state of processing one inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Applied to the local tier.
    Applied,
    /// Published by this instance.
    SelfIgnored,
    /// No cache of that name on this instance.
    UnknownCache,
    /// The cache exists but has no local tier to invalidate.
    NoLocalTier,
    /// Action not understood by this build.
    UnsupportedAction,
    /// Decoding or applying failed; the failure was reported to metrics.
    Dropped,
    /// Synchronization is switched off.
    Disabled,
}

/// Publishes local invalidations and applies remote ones.
pub struct SyncCoordinator {
    instance_id: String,
    channel: String,
    settings: SyncSettings,
    bus: Arc<dyn InvalidationBus>,
    registry: Arc<CacheRegistry>,
    metrics: Arc<dyn SyncMetrics>,
}

impl SyncCoordinator {
    pub fn new(
        settings: SyncSettings,
        bus: Arc<dyn InvalidationBus>,
        registry: Arc<CacheRegistry>,
    ) -> Self {
        let instance_id = Uuid::new_v4().to_string();
        let channel = settings.channel_name();

        tracing::info!(
            instance_id = %instance_id,
            channel = %channel,
            compression = settings.compress_messages,
            enabled = settings.enabled,
            "cache sync coordinator initialized"
        );

        Self {
            instance_id,
            channel,
            settings,
            bus,
            registry,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Set the metrics hook.
    pub fn with_metrics(mut self, metrics: Arc<dyn SyncMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Use a fixed instance id instead of a random one.
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Fully-qualified channel name.
    pub fn channel_name(&self) -> &str {
        &self.channel
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn compression_enabled(&self) -> bool {
        self.settings.compress_messages
    }

    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    /// Whether the current task is applying a remote invalidation.
    pub fn is_applying_remote() -> bool {
        APPLYING_REMOTE.try_with(|flag| *flag).unwrap_or(false)
    }

    /// Tell peers to invalidate their local copies.
    ///
    /// Never fails. Errors are logged and reported to metrics; peers keep
    /// their L1 copy until it expires.
    pub async fn publish(&self, intent: EvictionIntent) {
        if Self::is_applying_remote() {
            tracing::trace!(cache = %intent.cache_name, "skipping publish during remote invalidation");
            return;
        }

        if !self.settings.enabled {
            tracing::trace!(cache = %intent.cache_name, "cache sync disabled, not publishing");
            return;
        }

        let message = intent.into_message(&self.instance_id);
        match self.send(&message).await {
            Ok(()) => {
                tracing::debug!(
                    cache = %message.cache_name,
                    action = %message.action,
                    key_count = message.key_count(),
                    compressed = self.settings.compress_messages,
                    "published cache message"
                );
                self.metrics.record_publish(
                    &message.cache_name,
                    message.action,
                    message.key_count(),
                );
            }
            Err(e) => {
                tracing::warn!(
                    cache = %message.cache_name,
                    error = %e,
                    "failed to publish cache sync message"
                );
                self.metrics.record_error(&message.cache_name, &e);
            }
        }
    }

    async fn send(&self, message: &CacheMessage) -> Result<(), SyncError> {
        let payload = codec::encode(message, self.settings.compress_messages)?;
        self.bus.send(&self.channel, payload).await?;
        Ok(())
    }

    /// Process one payload delivered by the bus.
    ///
    /// Never fails; the returned [`Delivery`] says how processing ended.
    pub async fn on_message(&self, payload: &str) -> Delivery {
        if !self.settings.enabled {
            return Delivery::Disabled;
        }

        let message = match codec::decode(payload, self.settings.compress_messages) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(cache = "unknown", error = %e, "failed to decode cache sync message");
                self.metrics.record_error("unknown", &SyncError::Payload(e));
                return Delivery::Dropped;
            }
        };

        if message.origin_id == self.instance_id {
            tracing::trace!(cache = %message.cache_name, "ignoring self-published message");
            self.metrics.record_self_ignored();
            return Delivery::SelfIgnored;
        }

        let Some(cache) = self.registry.get_existing(&message.cache_name) else {
            tracing::warn!(
                cache = %message.cache_name,
                available = ?self.registry.names(),
                "received message for unknown cache"
            );
            return Delivery::UnknownCache;
        };

        // Only L1 is touched: the origin already wrote through to L2.
        let Some(local) = cache.local_tier().cloned() else {
            tracing::warn!(cache = %message.cache_name, "no local tier to invalidate");
            return Delivery::NoLocalTier;
        };

        if message.action == CacheAction::Unknown {
            tracing::warn!(
                cache = %message.cache_name,
                origin = %message.short_origin(),
                "ignoring unsupported cache action"
            );
            return Delivery::UnsupportedAction;
        }

        let applied = APPLYING_REMOTE
            .scope(true, apply_local(local.as_ref(), &message))
            .await;

        match applied {
            Ok(()) => {
                // CLEAR ignores any keys it carries
                let key_count = match message.action {
                    CacheAction::Clear => 0,
                    _ => message.key_count(),
                };
                tracing::debug!(
                    cache = %message.cache_name,
                    action = %message.action,
                    key_count,
                    origin = %message.short_origin(),
                    "processed remote cache message"
                );
                self.metrics
                    .record_receive(&message.cache_name, message.action, key_count);
                Delivery::Applied
            }
            Err(e) => {
                tracing::error!(
                    cache = %message.cache_name,
                    error = %e,
                    "error processing cache sync message"
                );
                self.metrics
                    .record_error(&message.cache_name, &SyncError::Apply(e));
                Delivery::Dropped
            }
        }
    }
}

async fn apply_local(tier: &dyn CacheTier, message: &CacheMessage) -> Result<(), TierError> {
    match message.action {
        CacheAction::Evict => {
            for key in &message.keys {
                tier.evict(key).await?;
            }
            tracing::debug!(cache = %message.cache_name, count = message.keys.len(), "evicted keys from L1");
        }
        CacheAction::Clear => {
            tier.clear().await?;
            tracing::debug!(cache = %message.cache_name, "cleared L1");
        }
        CacheAction::Unknown => {}
    }
    Ok(())
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("instance_id", &self.instance_id)
            .field("channel", &self.channel)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
