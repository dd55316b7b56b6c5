//! Metrics hook for the sync protocol.
//!
//! The coordinator always holds a hook; [`NoopMetrics`] is the default.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SyncError;
use crate::message::CacheAction;

/// Sink notified of synchronization events. Implementations must be
/// thread-safe; calls arrive from publishers and listeners concurrently.
pub trait SyncMetrics: Send + Sync {
    /// A message was handed to the bus.
    fn record_publish(&self, cache_name: &str, action: CacheAction, key_count: usize);

    /// A remote message was applied to the local tier. `key_count` is 0 for
    /// CLEAR.
    fn record_receive(&self, cache_name: &str, action: CacheAction, key_count: usize);

    /// Publishing or processing failed. `cache_name` is `"unknown"` when the
    /// payload could not be decoded.
    fn record_error(&self, cache_name: &str, error: &SyncError);

    /// A message published by this instance came back and was dropped.
    fn record_self_ignored(&self);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl SyncMetrics for NoopMetrics {
    fn record_publish(&self, _: &str, _: CacheAction, _: usize) {}
    fn record_receive(&self, _: &str, _: CacheAction, _: usize) {}
    fn record_error(&self, _: &str, _: &SyncError) {}
    fn record_self_ignored(&self) {}
}

/// In-process counters, readable through [`CountingMetrics::snapshot`].
#[derive(Debug, Default)]
pub struct CountingMetrics {
    published: AtomicU64,
    published_keys: AtomicU64,
    received: AtomicU64,
    received_keys: AtomicU64,
    errors: AtomicU64,
    self_ignored: AtomicU64,
}

/// Point-in-time copy of [`CountingMetrics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub published: u64,
    pub published_keys: u64,
    pub received: u64,
    pub received_keys: u64,
    pub errors: u64,
    pub self_ignored: u64,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SyncStats {
        SyncStats {
            published: self.published.load(Ordering::Relaxed),
            published_keys: self.published_keys.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            received_keys: self.received_keys.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            self_ignored: self.self_ignored.load(Ordering::Relaxed),
        }
    }
}

impl SyncMetrics for CountingMetrics {
    fn record_publish(&self, _cache_name: &str, _action: CacheAction, key_count: usize) {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.published_keys
            .fetch_add(key_count as u64, Ordering::Relaxed);
    }

    fn record_receive(&self, _cache_name: &str, _action: CacheAction, key_count: usize) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.received_keys
            .fetch_add(key_count as u64, Ordering::Relaxed);
    }

    fn record_error(&self, _cache_name: &str, _error: &SyncError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_self_ignored(&self) {
        self.self_ignored.fetch_add(1, Ordering::Relaxed);
    }
}
