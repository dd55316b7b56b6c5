use thiserror::Error;

/// Malformed or incompatible wire payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("gzip error: {0}")]
    Compression(#[from] std::io::Error),

    #[error("decompressed payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failure reported by an invalidation bus client.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus connection error: {0}")]
    Connection(String),

    #[error("bus publish error: {0}")]
    Publish(String),

    #[error("bus subscribe error: {0}")]
    Subscribe(String),

    #[error("bus stream ended")]
    StreamEnded,
}

/// Failure reported by a single cache tier.
#[derive(Debug, Error)]
pub enum TierError {
    #[error("tier backend error: {0}")]
    Backend(String),
}

impl TierError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Errors surfaced by the two-tier cache API.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Tier(#[from] TierError),

    #[error("value loader failed: {0}")]
    Load(#[source] anyhow::Error),

    #[error("value encoding error: {0}")]
    Serialization(String),
}

impl From<rmp_serde::encode::Error> for CacheError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CacheError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// A synchronization failure, as handed to the metrics hook.
///
/// These never escape `publish` or `on_message`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("transport error: {0}")]
    Transport(#[from] BusError),

    #[error("failed to apply remote invalidation: {0}")]
    Apply(#[from] TierError),
}

pub type CacheResult<T> = Result<T, CacheError>;
