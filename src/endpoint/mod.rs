//! The endpoint protocol: pluggable per-tenant request handlers.
//!
//! # Responsibilities
//! - Define the accept/handle contract every handler implements
//! - Carry the claim produced by `accept` to the matching `handle`
//! - Classify handler failures so the dispatcher can isolate them
//!
//! # Design Decisions
//! - `accept` does cheap matching, `handle` does the work; an endpoint
//!   that claims a request keeps it, failures included
//! - Claims are type-erased so unrelated endpoints can ride in one
//!   tenant's ordered list without sharing a claim type
//! - Endpoints come from a registry resolved at load time, never from
//!   code loaded at runtime
//!
//! # Data Flow
//! ```text
//! InboundRequest ──> accept() ──Some(Claim)──> handle() ──> Response
//!                       │
//!                       └──None──> next endpoint in the tenant's list
//! ```

pub mod registry;
pub mod reload;
pub mod static_files;

use std::any::Any;
use std::net::SocketAddr;
use std::path::PathBuf;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use thiserror::Error;
use url::Url;

use crate::routing::builder::BuildError;

pub use registry::{EndpointContext, EndpointRegistry};
pub use static_files::StaticEndpoint;

/// Result alias for endpoint operations.
pub type EndpointResult<T> = Result<T, EndpointError>;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("claim was produced by a different endpoint")]
    ClaimType,

    #[error("redirect target {location:?} is not a valid header value")]
    Redirect { location: String },

    #[error("failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} changed size since indexing")]
    Stale { path: PathBuf },

    #[error("routing state is shutting down")]
    Unavailable,

    #[error(transparent)]
    Rebuild(#[from] BuildError),
}

/// An inbound request reduced to what endpoints need to claim it.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub url: Url,
    pub remote_addr: Option<SocketAddr>,
}

impl InboundRequest {
    /// Lowercased hostname without the port.
    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }
}

/// Type-erased value an endpoint's `accept` hands to its `handle`.
pub struct Claim(Box<dyn Any + Send>);

impl Claim {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Recover the concrete claim; fails when dispatch pairs a claim
    /// with the wrong endpoint.
    pub fn downcast<T: Any>(self) -> EndpointResult<T> {
        match self.0.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(EndpointError::ClaimType),
        }
    }
}

impl std::fmt::Debug for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claim").finish_non_exhaustive()
    }
}

/// One pluggable request handler in a tenant's endpoint list.
///
/// The dispatcher tries `accept` in list order; the first endpoint
/// returning a claim wins and its `handle` produces the response.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn accept(&self, request: &InboundRequest) -> EndpointResult<Option<Claim>>;

    async fn handle(&self, claim: Claim) -> EndpointResult<Response>;
}
