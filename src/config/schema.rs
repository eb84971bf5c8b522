//! Configuration schema definitions.
//!
//! Two schemas live here: the server's own TOML configuration and the
//! per-tenant `directory.json` found in each content directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::content::mime::MimeRulesConfig;

/// Root configuration for the origin server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Content root holding the tenant directories.
    pub content: ContentConfig,

    /// Management hostnames bound to the reload endpoints.
    pub management: ManagementConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Content root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Directory whose subdirectories are the tenants.
    pub root: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

/// Management hostname configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagementConfig {
    /// Hostnames that answer the reload endpoints instead of tenant
    /// content. Also treated as aliases exempt from canonical-domain
    /// redirects.
    pub domains: Vec<String>,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            domains: vec![
                "localhost".to_string(),
                "127.0.0.1".to_string(),
                "::1".to_string(),
            ],
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Per-tenant configuration, deserialized from the tenant directory's
/// `directory.json`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryConfig {
    /// Hostnames routed to this tenant (exact match, lowercase).
    pub domains: Vec<String>,

    /// Extra response headers applied to every endpoint of this
    /// tenant.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Endpoint capabilities resolved from the registry, tried in
    /// order after the static endpoint.
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Static file serving; absent for purely dynamic tenants.
    #[serde(rename = "static")]
    pub static_site: Option<StaticConfig>,
}

/// Static content section of a tenant configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StaticConfig {
    /// Canonical domain; requests for other hostnames redirect here.
    pub domain: String,

    /// URL prefix the content is served under. Defaults to the
    /// directory name; "/" serves at the root.
    pub path: Option<String>,

    /// Tenant-root-relative paths excluded from indexing.
    /// `/directory.json` is always excluded.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Extra response headers for static responses.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// MIME rule overrides merged over the built-in rules.
    pub mime_types: Option<MimeRulesConfig>,
}
