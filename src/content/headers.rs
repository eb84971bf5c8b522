//! Header assembly for cache entries and redirects.

use std::collections::BTreeMap;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

/// Invalid header name or value in configuration.
#[derive(Debug, Error)]
#[error("invalid header {name:?}: {reason}")]
pub struct HeaderError {
    pub name: String,
    pub reason: String,
}

/// Headers applied beneath every tenant's own configuration.
pub fn default_headers() -> HeaderMap {
    let mut map = HeaderMap::new();
    map.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public,no-cache"),
    );
    map
}

/// Build a `HeaderMap` from configured string pairs.
pub fn compile_headers(pairs: &BTreeMap<String, String>) -> Result<HeaderMap, HeaderError> {
    let mut map = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| HeaderError {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| HeaderError {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        map.insert(header, value);
    }
    Ok(map)
}

/// Merge header maps left to right; later sources override earlier
/// ones. Names compare case-insensitively (`HeaderName` is normalized).
pub fn merge(sources: &[&HeaderMap]) -> HeaderMap {
    let mut merged = HeaderMap::new();
    for source in sources {
        for (name, value) in source.iter() {
            merged.insert(name.clone(), value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_compile_valid() {
        let map = compile_headers(&pairs(&[("X-Frame-Options", "DENY")])).unwrap();
        assert_eq!(map.get("x-frame-options").unwrap(), "DENY");
    }

    #[test]
    fn test_compile_rejects_invalid_name() {
        let err = compile_headers(&pairs(&[("not a header", "x")])).unwrap_err();
        assert_eq!(err.name, "not a header");
    }

    #[test]
    fn test_compile_rejects_invalid_value() {
        assert!(compile_headers(&pairs(&[("x-test", "bad\nvalue")])).is_err());
    }

    #[test]
    fn test_merge_later_wins() {
        let first = compile_headers(&pairs(&[("x-tag", "one"), ("x-keep", "kept")])).unwrap();
        let second = compile_headers(&pairs(&[("X-TAG", "two")])).unwrap();
        let merged = merge(&[&first, &second]);
        assert_eq!(merged.get("x-tag").unwrap(), "two");
        assert_eq!(merged.get("x-keep").unwrap(), "kept");
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_defaults_include_cache_control() {
        assert_eq!(
            default_headers().get("cache-control").unwrap(),
            "public,no-cache"
        );
    }
}
