//! Prometheus metrics for cache synchronization.
//!
//! [`PrometheusMetrics`] forwards coordinator events to the `metrics`
//! facade; [`init_metrics`] installs the Prometheus recorder that collects
//! them.

use cachesync_core::{CacheAction, SyncError, SyncMetrics};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const PUBLISHED_TOTAL: &str = "cache_sync_published_total";
    pub const PUBLISHED_KEYS_TOTAL: &str = "cache_sync_published_keys_total";
    pub const RECEIVED_TOTAL: &str = "cache_sync_received_total";
    pub const RECEIVED_KEYS_TOTAL: &str = "cache_sync_received_keys_total";
    pub const ERRORS_TOTAL: &str = "cache_sync_errors_total";
    pub const SELF_IGNORED_TOTAL: &str = "cache_sync_self_ignored_total";
}

/// Install the Prometheus recorder.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

fn error_kind(error: &SyncError) -> &'static str {
    match error {
        SyncError::Payload(_) => "payload",
        SyncError::Transport(_) => "transport",
        SyncError::Apply(_) => "apply",
    }
}

/// [`SyncMetrics`] hook reporting to the installed `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetrics;

impl SyncMetrics for PrometheusMetrics {
    fn record_publish(&self, cache_name: &str, action: CacheAction, key_count: usize) {
        let labels = [
            ("cache", cache_name.to_string()),
            ("action", action.to_string()),
        ];
        counter!(names::PUBLISHED_TOTAL, &labels).increment(1);
        counter!(names::PUBLISHED_KEYS_TOTAL, &labels).increment(key_count as u64);
    }

    fn record_receive(&self, cache_name: &str, action: CacheAction, key_count: usize) {
        let labels = [
            ("cache", cache_name.to_string()),
            ("action", action.to_string()),
        ];
        counter!(names::RECEIVED_TOTAL, &labels).increment(1);
        counter!(names::RECEIVED_KEYS_TOTAL, &labels).increment(key_count as u64);
    }

    fn record_error(&self, cache_name: &str, error: &SyncError) {
        counter!(
            names::ERRORS_TOTAL,
            "cache" => cache_name.to_string(),
            "kind" => error_kind(error)
        )
        .increment(1);
    }

    fn record_self_ignored(&self) {
        counter!(names::SELF_IGNORED_TOTAL).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachesync_core::{BusError, PayloadError};

    #[test]
    fn test_counters_are_recorded() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let hook = PrometheusMetrics;
            hook.record_publish("users", CacheAction::Evict, 3);
            hook.record_receive("users", CacheAction::Clear, 0);
            hook.record_error("users", &SyncError::Transport(BusError::StreamEnded));
            hook.record_self_ignored();
            hook.record_self_ignored();
        });

        let output = handle.render();
        assert!(output.contains(r#"cache_sync_published_total{cache="users",action="EVICT"} 1"#));
        assert!(output.contains(r#"cache_sync_published_keys_total{cache="users",action="EVICT"} 3"#));
        assert!(output.contains(r#"cache_sync_received_total{cache="users",action="CLEAR"} 1"#));
        assert!(output.contains(r#"cache_sync_errors_total{cache="users",kind="transport"} 1"#));
        assert!(output.contains("cache_sync_self_ignored_total 2"));
    }

    #[test]
    fn test_error_kind_labels() {
        let payload = serde_json::from_str::<serde_json::Value>("{")
            .map_err(PayloadError::from)
            .unwrap_err();
        assert_eq!(error_kind(&SyncError::Payload(payload)), "payload");
        assert_eq!(
            error_kind(&SyncError::Transport(BusError::Publish("x".into()))),
            "transport"
        );
    }
}
