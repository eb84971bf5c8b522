//! MIME classification rules.
//!
//! # Design Decisions
//! - Rules are an ordered list; the first rule with a matching filename
//!   suffix wins
//! - Tenant rules overlay the built-in set the way config maps merge:
//!   a known content type is replaced in place, a new one is appended
//! - Rules are compiled once per directory load; request handling never
//!   parses configuration

use std::collections::BTreeMap;

use axum::http::{HeaderMap, HeaderValue};
use serde::Deserialize;
use thiserror::Error;

use crate::content::headers::{self, HeaderError};
use crate::content::threshold::{CacheThreshold, ThresholdError, ThresholdSpec};

/// Raw per-content-type rule as it appears in `directory.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MimeRuleConfig {
    /// Filename suffixes (including the dot) this rule applies to.
    pub suffixes: Vec<String>,

    /// Extra headers set on matching entries.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Pre-compress cached bodies with brotli.
    #[serde(default)]
    pub compress: bool,

    /// In-memory cache limit; absent means always cache.
    #[serde(default)]
    pub cache_threshold: Option<ThresholdSpec>,
}

/// Ordered content type → rule map from config. `serde_json`'s map
/// preserves the file order, which is the match order.
pub type MimeRulesConfig = serde_json::Map<String, serde_json::Value>;

/// A compiled classification rule.
#[derive(Debug, Clone)]
pub struct MimeRule {
    pub content_type: HeaderValue,
    pub suffixes: Vec<String>,
    pub extra_headers: HeaderMap,
    pub compress: bool,
    pub threshold: CacheThreshold,
}

impl MimeRule {
    /// Whether `file_name` falls under this rule.
    pub fn matches(&self, file_name: &str) -> bool {
        self.suffixes.iter().any(|s| file_name.ends_with(s.as_str()))
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("mime rule {content_type:?}: {reason}")]
    Shape {
        content_type: String,
        reason: String,
    },

    #[error("mime rule {content_type:?}: not a valid content type")]
    ContentType { content_type: String },

    #[error("mime rule {content_type:?}: suffix list is empty")]
    NoSuffixes { content_type: String },

    #[error("mime rule {content_type:?}: {source}")]
    Threshold {
        content_type: String,
        source: ThresholdError,
    },

    #[error("mime rule {content_type:?}: {source}")]
    Header {
        content_type: String,
        source: HeaderError,
    },
}

/// Built-in rules covering common static site content. Text formats
/// compress; large binary formats fall back to streaming past 1mb.
const BUILT_IN: &[(&str, &[&str], bool, CacheThreshold)] = &[
    ("text/html; charset=utf-8", &[".html", ".htm"], true, CacheThreshold::Unbounded),
    ("text/css; charset=utf-8", &[".css"], true, CacheThreshold::Unbounded),
    ("text/javascript; charset=utf-8", &[".js", ".mjs"], true, CacheThreshold::Unbounded),
    ("application/json", &[".json", ".map"], true, CacheThreshold::Unbounded),
    ("image/svg+xml", &[".svg"], true, CacheThreshold::Unbounded),
    ("text/plain; charset=utf-8", &[".txt"], true, CacheThreshold::Unbounded),
    ("application/xml", &[".xml"], true, CacheThreshold::Unbounded),
    ("application/manifest+json", &[".webmanifest"], true, CacheThreshold::Unbounded),
    ("image/png", &[".png"], false, CacheThreshold::Unbounded),
    ("image/jpeg", &[".jpg", ".jpeg"], false, CacheThreshold::Unbounded),
    ("image/webp", &[".webp"], false, CacheThreshold::Unbounded),
    ("image/gif", &[".gif"], false, CacheThreshold::Unbounded),
    ("image/x-icon", &[".ico"], false, CacheThreshold::Unbounded),
    ("font/woff2", &[".woff2"], false, CacheThreshold::Unbounded),
    ("font/woff", &[".woff"], false, CacheThreshold::Unbounded),
    ("application/wasm", &[".wasm"], false, CacheThreshold::Bytes(1024 * 1024)),
    ("application/pdf", &[".pdf"], false, CacheThreshold::Bytes(1024 * 1024)),
    ("video/mp4", &[".mp4"], false, CacheThreshold::Bytes(1024 * 1024)),
    ("video/webm", &[".webm"], false, CacheThreshold::Bytes(1024 * 1024)),
    ("audio/mpeg", &[".mp3"], false, CacheThreshold::Bytes(1024 * 1024)),
];

/// The built-in rule set, in match order.
pub fn built_in_rules() -> Vec<MimeRule> {
    BUILT_IN
        .iter()
        .map(|(content_type, suffixes, compress, threshold)| MimeRule {
            content_type: HeaderValue::from_static(content_type),
            suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
            extra_headers: HeaderMap::new(),
            compress: *compress,
            threshold: *threshold,
        })
        .collect()
}

/// Overlay tenant rules onto the built-in set.
pub fn compile_rules(overrides: Option<&MimeRulesConfig>) -> Result<Vec<MimeRule>, RuleError> {
    let mut rules = built_in_rules();
    let Some(overrides) = overrides else {
        return Ok(rules);
    };
    for (content_type, value) in overrides {
        let config: MimeRuleConfig =
            serde_json::from_value(value.clone()).map_err(|e| RuleError::Shape {
                content_type: content_type.clone(),
                reason: e.to_string(),
            })?;
        let rule = compile_rule(content_type, &config)?;
        match rules.iter().position(|r| r.content_type == content_type.as_str()) {
            Some(index) => rules[index] = rule,
            None => rules.push(rule),
        }
    }
    Ok(rules)
}

fn compile_rule(content_type: &str, config: &MimeRuleConfig) -> Result<MimeRule, RuleError> {
    if config.suffixes.is_empty() {
        return Err(RuleError::NoSuffixes {
            content_type: content_type.to_string(),
        });
    }
    Ok(MimeRule {
        content_type: HeaderValue::from_str(content_type).map_err(|_| RuleError::ContentType {
            content_type: content_type.to_string(),
        })?,
        suffixes: config.suffixes.clone(),
        extra_headers: headers::compile_headers(&config.headers).map_err(|source| {
            RuleError::Header {
                content_type: content_type.to_string(),
                source,
            }
        })?,
        compress: config.compress,
        threshold: CacheThreshold::parse(config.cache_threshold.as_ref()).map_err(|source| {
            RuleError::Threshold {
                content_type: content_type.to_string(),
                source,
            }
        })?,
    })
}

/// First rule matching the file name, in rule order.
pub fn match_rule<'a>(rules: &'a [MimeRule], file_name: &str) -> Option<&'a MimeRule> {
    rules.iter().find(|rule| rule.matches(file_name))
}
