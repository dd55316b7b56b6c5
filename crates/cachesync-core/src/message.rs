//! Invalidation message model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a peer should do with its local copy of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheAction {
    /// Remove the listed keys.
    Evict,
    /// Drop every entry of the cache; keys are ignored.
    Clear,
    /// An action this build does not know about (sent by a newer peer).
    #[serde(other)]
    Unknown,
}

impl fmt::Display for CacheAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evict => write!(f, "EVICT"),
            Self::Clear => write!(f, "CLEAR"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// The message exchanged on the invalidation channel.
///
/// ```text
/// {"cacheName":"countries","keys":["KE"],"action":"EVICT","originId":"..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMessage {
    pub cache_name: String,
    #[serde(default)]
    pub keys: Vec<String>,
    pub action: CacheAction,
    #[serde(default)]
    pub origin_id: String,
}

impl CacheMessage {
    pub fn new(
        cache_name: impl Into<String>,
        keys: Vec<String>,
        action: CacheAction,
        origin_id: impl Into<String>,
    ) -> Self {
        Self {
            cache_name: cache_name.into(),
            keys,
            action,
            origin_id: origin_id.into(),
        }
    }

    /// Number of keys this message affects, as reported to metrics.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Shortened origin id for log lines.
    pub fn short_origin(&self) -> &str {
        let end = self
            .origin_id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.origin_id.len());
        &self.origin_id[..end]
    }
}

/// An already-resolved eviction, as produced by whatever layer observed it.
///
/// The origin id is stamped by the coordinator when the intent is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionIntent {
    pub cache_name: String,
    pub keys: Vec<String>,
    pub action: CacheAction,
}

impl EvictionIntent {
    /// Evict the given keys.
    pub fn evict<I, S>(cache_name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cache_name: cache_name.into(),
            keys: keys.into_iter().map(Into::into).collect(),
            action: CacheAction::Evict,
        }
    }

    /// Drop everything in the cache.
    pub fn clear(cache_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            keys: Vec::new(),
            action: CacheAction::Clear,
        }
    }

    /// Map an interception-layer eviction (`allEntries` style) onto an intent.
    pub fn from_annotation(
        cache_name: impl Into<String>,
        keys: Vec<String>,
        all_entries: bool,
    ) -> Self {
        if all_entries {
            Self::clear(cache_name)
        } else {
            Self {
                cache_name: cache_name.into(),
                keys,
                action: CacheAction::Evict,
            }
        }
    }

    pub(crate) fn into_message(self, origin_id: &str) -> CacheMessage {
        let keys = match self.action {
            CacheAction::Clear => Vec::new(),
            _ => self.keys,
        };
        CacheMessage::new(self.cache_name, keys, self.action, origin_id)
    }
}
