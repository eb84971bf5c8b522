//! Resolved routing state: tenants and the hostname table.
//!
//! # Responsibilities
//! - Hold one tenant's ready-to-serve form (domains + endpoint list)
//! - Map hostnames to tenants for the dispatcher
//!
//! # Design Decisions
//! - Immutable after composition; reloads replace whole tables
//! - Tenants are also indexed by directory name, which is what the
//!   per-directory reload trigger consults

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::endpoint::Endpoint;

/// One tenant directory, resolved and ready to serve.
pub struct DirectoryState {
    /// Tenant directory name.
    pub name: String,
    /// Hostnames this tenant answers for.
    pub domains: BTreeSet<String>,
    /// Handlers tried in order; the first claim wins.
    pub endpoints: Vec<Arc<dyn Endpoint>>,
}

/// Hostname → tenant mapping served by the dispatcher.
///
/// Requests in flight keep the table they started with; a reload swaps
/// in a fresh one.
pub struct RoutingTable {
    /// Every routable hostname, management aliases included.
    hosts: HashMap<String, Arc<DirectoryState>>,
    /// Tenants by directory name.
    tenants: BTreeMap<String, Arc<DirectoryState>>,
}

impl RoutingTable {
    pub(crate) fn new(
        hosts: HashMap<String, Arc<DirectoryState>>,
        tenants: BTreeMap<String, Arc<DirectoryState>>,
    ) -> Self {
        Self { hosts, tenants }
    }

    /// A table serving only the management endpoints. This is the boot
    /// state before the initial load lands.
    pub(crate) fn management_only(management: &Arc<DirectoryState>) -> Self {
        let hosts = management
            .domains
            .iter()
            .map(|domain| (domain.clone(), Arc::clone(management)))
            .collect();
        Self {
            hosts,
            tenants: BTreeMap::new(),
        }
    }

    pub fn lookup(&self, hostname: &str) -> Option<&Arc<DirectoryState>> {
        self.hosts.get(hostname)
    }

    pub fn directory(&self, name: &str) -> Option<&Arc<DirectoryState>> {
        self.tenants.get(name)
    }

    pub(crate) fn tenants(&self) -> &BTreeMap<String, Arc<DirectoryState>> {
        &self.tenants
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }
}
