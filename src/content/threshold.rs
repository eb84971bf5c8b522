//! Cache threshold parsing.
//!
//! # Design Decisions
//! - Thresholds are resolved at load time; a malformed value fails the
//!   directory's load instead of surfacing on a request
//! - Values are parsed by hand; the grammar is two tokens

use serde::Deserialize;
use thiserror::Error;

/// Upper bound on file size for in-memory caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheThreshold {
    /// No limit: every matching file is held in memory.
    Unbounded,
    /// Hold files up to this many bytes in memory; stream the rest.
    Bytes(u64),
}

/// Raw threshold value as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSpec {
    /// Plain byte count.
    Bytes(u64),
    /// Human-readable form like `"64kb"` or `"1.5mb"`.
    Text(String),
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid cache threshold {0:?}, expected a byte count or e.g. \"512kb\"")]
pub struct ThresholdError(String);

impl CacheThreshold {
    /// Resolve an optional config value. Absent means unbounded.
    pub fn parse(spec: Option<&ThresholdSpec>) -> Result<Self, ThresholdError> {
        match spec {
            None => Ok(Self::Unbounded),
            Some(ThresholdSpec::Bytes(n)) => Ok(Self::Bytes(*n)),
            Some(ThresholdSpec::Text(text)) => parse_text(text),
        }
    }

    /// Whether a file of `size` bytes is small enough to cache.
    pub fn admits(&self, size: u64) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Bytes(limit) => size <= *limit,
        }
    }
}

/// Accepts `<digits>[.<digits>][k|m|g]b`, case-insensitive.
fn parse_text(text: &str) -> Result<CacheThreshold, ThresholdError> {
    let lower = text.to_ascii_lowercase();
    let invalid = || ThresholdError(text.to_string());

    let rest = lower.strip_suffix('b').ok_or_else(invalid)?;
    let (number, multiplier) = match rest.as_bytes().last() {
        Some(b'k') => (&rest[..rest.len() - 1], 1024f64),
        Some(b'm') => (&rest[..rest.len() - 1], 1024f64 * 1024.0),
        Some(b'g') => (&rest[..rest.len() - 1], 1024f64 * 1024.0 * 1024.0),
        _ => (rest, 1f64),
    };

    let mut parts = number.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || !fraction.map_or(true, digits) {
        return Err(invalid());
    }

    let value: f64 = number.parse().map_err(|_| invalid())?;
    Ok(CacheThreshold::Bytes((value * multiplier) as u64))
}
