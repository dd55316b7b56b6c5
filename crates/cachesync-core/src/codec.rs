//! Wire codec for invalidation messages.
//!
//! Messages travel as JSON text. With compression enabled the JSON is gzipped
//! and base64 encoded so it still fits the same text channel.

use std::io::{Read, Write};

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use crate::error::PayloadError;
use crate::message::CacheMessage;

/// Compression ratio below which compressing is considered worthwhile.
const WORTHWHILE_RATIO: f64 = 0.8;

/// Serialize a message, optionally compressing it.
pub fn encode(message: &CacheMessage, compress_payload: bool) -> Result<String, PayloadError> {
    let json = serde_json::to_string(message)?;
    if compress_payload {
        compress(&json)
    } else {
        Ok(json)
    }
}

/// Inverse of [`encode`]; `compressed` must match the flag used to encode.
pub fn decode(payload: &str, compressed: bool) -> Result<CacheMessage, PayloadError> {
    let message = if compressed {
        let json = decompress(payload)?;
        serde_json::from_str(&json)?
    } else {
        serde_json::from_str(payload)?
    };
    Ok(message)
}

/// Gzip `text` and encode the result as standard base64.
///
/// Output is deterministic for a given input. An empty string compresses to
/// an empty string.
pub fn compress(text: &str) -> Result<String, PayloadError> {
    if text.is_empty() {
        return Ok(String::new());
    }

    let mut encoder = GzEncoder::new(Vec::with_capacity(text.len()), Compression::default());
    encoder.write_all(text.as_bytes())?;
    let compressed = encoder.finish()?;

    tracing::trace!(
        original = %format_size(text.len() as u64),
        compressed = %format_size(compressed.len() as u64),
        "compressed payload"
    );

    Ok(STANDARD.encode(compressed))
}

/// Decode base64 and gunzip. An empty string decompresses to an empty string.
pub fn decompress(encoded: &str) -> Result<String, PayloadError> {
    if encoded.is_empty() {
        return Ok(String::new());
    }

    let compressed = STANDARD.decode(encoded)?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;

    Ok(String::from_utf8(raw)?)
}

/// Compressed size divided by original size; `1.0` when nothing is gained or
/// compression fails.
pub fn compression_ratio(text: &str) -> f64 {
    if text.is_empty() {
        return 1.0;
    }

    let compressed = match compress(text).and_then(|c| Ok(STANDARD.decode(c)?)) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to estimate compression ratio");
            return 1.0;
        }
    };

    compressed.len() as f64 / text.len() as f64
}

/// Whether compressing `text` would save at least 20%.
pub fn should_compress(text: &str) -> bool {
    compression_ratio(text) < WORTHWHILE_RATIO
}

/// Human-readable byte size, e.g. `"1.50 KB"`.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b < KB => format!("{b} B"),
        b if b < MB => format!("{:.2} KB", b as f64 / KB as f64),
        b if b < GB => format!("{:.2} MB", b as f64 / MB as f64),
        b => format!("{:.2} GB", b as f64 / GB as f64),
    }
}
