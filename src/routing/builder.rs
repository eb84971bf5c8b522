//! Tenant directory scanning and table composition.
//!
//! # Responsibilities
//! - Discover tenant directories (direct subdirectories with a
//!   `directory.json`)
//! - Build one DirectoryState per tenant: load config, index content,
//!   resolve endpoint capabilities
//! - Compose DirectoryStates into a RoutingTable, rejecting domain
//!   collisions
//!
//! # Design Decisions
//! - A directory that fails to load fails the rebuild that needed it;
//!   no partially-loaded tenant is ever visible
//! - Composition is deterministic: tenants compose in name order
//! - The management state joins every composed table, and a tenant
//!   claiming a management hostname is a domain conflict

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::loader;
use crate::config::ConfigError;
use crate::content::headers::{self, HeaderError};
use crate::content::indexer;
use crate::content::mime::{self, RuleError};
use crate::content::path;
use crate::content::IndexError;
use crate::endpoint::{Endpoint, EndpointContext, EndpointRegistry, StaticEndpoint};
use crate::observability::metrics;
use crate::routing::state::{DirectoryState, RoutingTable};

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("directory {directory:?}: {source}")]
    Config {
        directory: String,
        #[source]
        source: ConfigError,
    },

    #[error("directory {directory:?}: {source}")]
    Headers {
        directory: String,
        #[source]
        source: HeaderError,
    },

    #[error("directory {directory:?}: {source}")]
    Rules {
        directory: String,
        #[source]
        source: RuleError,
    },

    #[error("directory {directory:?}: {source}")]
    Index {
        directory: String,
        #[source]
        source: IndexError,
    },

    #[error("domain {domain:?} is assigned to both {first:?} and {second:?}")]
    DomainConflict {
        domain: String,
        first: String,
        second: String,
    },

    #[error("directory {directory:?}: unknown endpoint capability {name:?}")]
    UnknownEndpoint { directory: String, name: String },

    #[error("failed to scan {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tenant directories under `root`, sorted by name. A tenant is a
/// direct subdirectory with a `directory.json` file; dot-named entries
/// and names shadowing a management hostname are skipped.
pub async fn scan_directories(
    root: &Path,
    management_domains: &HashSet<String>,
) -> BuildResult<Vec<String>> {
    let scan_err = |source| BuildError::Scan {
        path: root.to_path_buf(),
        source,
    };
    let mut directories = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await.map_err(scan_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(scan_err)? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.starts_with('.') || management_domains.contains(name) {
            continue;
        }
        let file_type = entry.file_type().await.map_err(scan_err)?;
        if !file_type.is_dir() {
            continue;
        }
        match tokio::fs::metadata(entry.path().join("directory.json")).await {
            Ok(meta) if meta.is_file() => directories.push(name.to_string()),
            _ => {}
        }
    }
    directories.sort();
    Ok(directories)
}

/// Build one tenant's ready-to-serve state from its directory.
pub async fn load_directory_state(
    root: &Path,
    name: &str,
    registry: &EndpointRegistry,
    management_domains: &HashSet<String>,
) -> BuildResult<Arc<DirectoryState>> {
    let dir = root.join(name);
    let config = loader::load_directory_config(&dir.join("directory.json"))
        .await
        .map_err(|source| BuildError::Config {
            directory: name.to_string(),
            source,
        })?;

    let tenant_headers = headers::compile_headers(&config.headers).map_err(|source| {
        BuildError::Headers {
            directory: name.to_string(),
            source,
        }
    })?;
    let merged = headers::merge(&[&headers::default_headers(), &tenant_headers]);

    let mut endpoints: Vec<Arc<dyn Endpoint>> = Vec::new();
    if let Some(static_config) = &config.static_site {
        let static_headers =
            headers::compile_headers(&static_config.headers).map_err(|source| {
                BuildError::Headers {
                    directory: name.to_string(),
                    source,
                }
            })?;
        let base = headers::merge(&[&merged, &static_headers]);
        let rules = mime::compile_rules(static_config.mime_types.as_ref()).map_err(|source| {
            BuildError::Rules {
                directory: name.to_string(),
                source,
            }
        })?;
        let prefix = match &static_config.path {
            Some(path) => path::sanitize(path),
            None => path::sanitize(name),
        };
        let mut excludes: HashSet<String> = HashSet::new();
        excludes.insert("/directory.json".to_string());
        for exclude in &static_config.excludes {
            excludes.insert(path::sanitize(exclude));
        }

        let routes = indexer::walk(
            &dir,
            &static_config.domain,
            &prefix,
            &base,
            &rules,
            &excludes,
        )
        .await
        .map_err(|source| BuildError::Index {
            directory: name.to_string(),
            source,
        })?;
        metrics::record_routes(name, routes.len());
        endpoints.push(Arc::new(StaticEndpoint::new(
            &prefix,
            routes,
            static_config.domain.clone(),
            management_domains.clone(),
            base,
        )));
    }

    let context = EndpointContext {
        directory: name.to_string(),
        headers: merged,
    };
    for capability in &config.endpoints {
        let endpoint =
            registry
                .resolve(capability, &context)
                .ok_or_else(|| BuildError::UnknownEndpoint {
                    directory: name.to_string(),
                    name: capability.clone(),
                })?;
        endpoints.push(endpoint);
    }

    tracing::info!(
        directory = %name,
        domains = config.domains.len(),
        endpoints = endpoints.len(),
        "Loaded tenant directory"
    );
    Ok(Arc::new(DirectoryState {
        name: name.to_string(),
        domains: config.domains.iter().cloned().collect(),
        endpoints,
    }))
}

/// Union tenants and the management state into one table. Every domain
/// must have exactly one owner or the whole composition fails.
pub fn compose(
    tenants: BTreeMap<String, Arc<DirectoryState>>,
    management: &Arc<DirectoryState>,
) -> BuildResult<RoutingTable> {
    let mut hosts: HashMap<String, Arc<DirectoryState>> = HashMap::new();
    for domain in &management.domains {
        hosts.insert(domain.clone(), Arc::clone(management));
    }
    for state in tenants.values() {
        for domain in &state.domains {
            if let Some(owner) = hosts.get(domain) {
                return Err(BuildError::DomainConflict {
                    domain: domain.clone(),
                    first: owner.name.clone(),
                    second: state.name.clone(),
                });
            }
            hosts.insert(domain.clone(), Arc::clone(state));
        }
    }
    Ok(RoutingTable::new(hosts, tenants))
}
