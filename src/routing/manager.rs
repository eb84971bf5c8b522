//! Process-wide routing state: atomic table swaps and single-flight
//! reloads.
//!
//! # Responsibilities
//! - Hold the shared routing table behind an atomically swappable
//!   pointer
//! - Run full and per-directory rebuilds, one in flight per trigger
//! - Keep the previous table serving when a rebuild fails
//!
//! # Design Decisions
//! - Readers never lock; they load the current table pointer and keep
//!   that snapshot for the whole request
//! - The flight flag check-and-set is atomic (map entry API) and the
//!   flag is cleared by an RAII permit, so failures release it too
//! - A mutex serializes compose-and-store only; directory indexing
//!   runs outside it, so rebuilds of different directories overlap

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::content::headers;
use crate::endpoint::reload::{UpdateAllEndpoint, UpdateDirectoryEndpoint};
use crate::endpoint::{Endpoint, EndpointContext, EndpointRegistry};
use crate::observability::metrics;
use crate::routing::builder::{self, BuildResult};
use crate::routing::state::{DirectoryState, RoutingTable};

/// Result of a triggered reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Updated,
    /// A rebuild for the same trigger was already in flight.
    Busy,
}

/// Single-flight key; at most one rebuild runs per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ReloadKey {
    All,
    Directory(String),
}

pub struct RoutingManager {
    root: PathBuf,
    management_domains: HashSet<String>,
    registry: EndpointRegistry,
    management: Arc<DirectoryState>,
    shared: ArcSwap<RoutingTable>,
    flights: DashMap<ReloadKey, ()>,
    /// Serializes compose-and-store; never held while indexing.
    swap_lock: Mutex<()>,
}

impl RoutingManager {
    /// Builds the manager with its reload endpoints bound to the
    /// management hostnames. The table serves only those endpoints
    /// until `load_initial` succeeds.
    pub fn new(
        root: PathBuf,
        management_domains: HashSet<String>,
        registry: EndpointRegistry,
    ) -> Arc<Self> {
        Arc::new_cyclic(|manager: &Weak<RoutingManager>| {
            let mut endpoints: Vec<Arc<dyn Endpoint>> = vec![
                Arc::new(UpdateAllEndpoint::new(manager.clone())),
                Arc::new(UpdateDirectoryEndpoint::new(manager.clone())),
            ];
            let context = EndpointContext {
                directory: "management".to_string(),
                headers: headers::default_headers(),
            };
            if let Some(status) = registry.resolve("status", &context) {
                endpoints.push(status);
            }
            let management = Arc::new(DirectoryState {
                name: "management".to_string(),
                domains: management_domains.iter().cloned().collect(),
                endpoints,
            });
            let table = RoutingTable::management_only(&management);
            Self {
                root,
                management_domains,
                registry,
                management,
                shared: ArcSwap::from_pointee(table),
                flights: DashMap::new(),
                swap_lock: Mutex::new(()),
            }
        })
    }

    /// Current table snapshot. Requests in flight keep the snapshot
    /// they loaded.
    pub fn table(&self) -> Arc<RoutingTable> {
        self.shared.load_full()
    }

    pub(crate) fn knows_directory(&self, name: &str) -> bool {
        self.shared.load().directory(name).is_some()
    }

    /// Boot-time full load. Failure means there is no table to serve;
    /// the caller treats it as fatal.
    pub async fn load_initial(&self) -> BuildResult<()> {
        let table = self.build_full_table().await?;
        self.install(table);
        Ok(())
    }

    /// Full rebuild behind the whole-table flight key.
    pub async fn rebuild_all(&self) -> BuildResult<ReloadOutcome> {
        let Some(_permit) = self.begin(ReloadKey::All) else {
            tracing::warn!("Full rebuild already in flight");
            metrics::record_reload("all", "busy");
            return Ok(ReloadOutcome::Busy);
        };
        tracing::info!("Rebuilding all directories");
        match self.build_full_table().await {
            Ok(table) => {
                let _swap = self.swap_lock.lock().await;
                self.install(table);
                metrics::record_reload("all", "updated");
                Ok(ReloadOutcome::Updated)
            }
            Err(err) => {
                tracing::error!(error = %err, "Full rebuild failed, previous table kept");
                metrics::record_reload("all", "failed");
                Err(err)
            }
        }
    }

    /// Rebuild one tenant behind its own flight key. The rest of the
    /// table rides over from the current snapshot.
    pub async fn rebuild_directory(&self, name: &str) -> BuildResult<ReloadOutcome> {
        let Some(_permit) = self.begin(ReloadKey::Directory(name.to_string())) else {
            tracing::warn!(directory = %name, "Rebuild already in flight");
            metrics::record_reload("directory", "busy");
            return Ok(ReloadOutcome::Busy);
        };
        tracing::info!(directory = %name, "Rebuilding directory");
        let rebuilt: BuildResult<()> = async {
            let state = builder::load_directory_state(
                &self.root,
                name,
                &self.registry,
                &self.management_domains,
            )
            .await?;
            let _swap = self.swap_lock.lock().await;
            let mut tenants = self.shared.load().tenants().clone();
            tenants.insert(name.to_string(), state);
            let table = builder::compose(tenants, &self.management)?;
            self.install(table);
            Ok(())
        }
        .await;
        match rebuilt {
            Ok(()) => {
                metrics::record_reload("directory", "updated");
                Ok(ReloadOutcome::Updated)
            }
            Err(err) => {
                tracing::error!(
                    directory = %name,
                    error = %err,
                    "Rebuild failed, previous table kept"
                );
                metrics::record_reload("directory", "failed");
                Err(err)
            }
        }
    }

    async fn build_full_table(&self) -> BuildResult<RoutingTable> {
        let names = builder::scan_directories(&self.root, &self.management_domains).await?;
        let mut tenants = BTreeMap::new();
        for name in names {
            let state = builder::load_directory_state(
                &self.root,
                &name,
                &self.registry,
                &self.management_domains,
            )
            .await?;
            tenants.insert(name, state);
        }
        builder::compose(tenants, &self.management)
    }

    fn install(&self, table: RoutingTable) {
        tracing::info!(
            tenants = table.tenant_count(),
            hosts = table.host_count(),
            "Routing table updated"
        );
        self.shared.store(Arc::new(table));
    }

    /// Atomic check-and-set of the per-trigger flight flag. The permit
    /// clears the flag on drop, success or failure alike.
    fn begin(&self, key: ReloadKey) -> Option<FlightPermit<'_>> {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(FlightPermit {
                    flights: &self.flights,
                    key,
                })
            }
        }
    }
}

struct FlightPermit<'a> {
    flights: &'a DashMap<ReloadKey, ()>,
    key: ReloadKey,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.flights.remove(&self.key);
    }
}
