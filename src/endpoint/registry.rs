//! Startup-resolved endpoint capability registry.
//!
//! # Responsibilities
//! - Map `endpoints` config entries to endpoint implementations
//! - Inject the tenant's merged headers into each instance
//!
//! # Design Decisions
//! - Capabilities are registered in code before boot; a tenant naming
//!   an unregistered capability fails that directory's load
//! - Factories run once per directory load, so endpoints can precompute
//!   against the tenant's headers

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::Response;

use crate::endpoint::{Claim, Endpoint, EndpointResult, InboundRequest};

/// Per-tenant context handed to endpoint factories.
#[derive(Debug, Clone)]
pub struct EndpointContext {
    /// Tenant directory name.
    pub directory: String,
    /// Merged default and tenant headers.
    pub headers: HeaderMap,
}

type EndpointFactory = dyn Fn(&EndpointContext) -> Arc<dyn Endpoint> + Send + Sync;

/// Known endpoint capabilities, resolved by name at directory load.
pub struct EndpointRegistry {
    factories: HashMap<String, Box<EndpointFactory>>,
}

impl EndpointRegistry {
    /// A registry with no capabilities.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The registry with the built-in capabilities registered.
    pub fn built_in() -> Self {
        let mut registry = Self::empty();
        registry.register("status", |context| {
            Arc::new(StatusEndpoint {
                headers: context.headers.clone(),
            }) as Arc<dyn Endpoint>
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&EndpointContext) -> Arc<dyn Endpoint> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Instantiate the named capability for one tenant.
    pub fn resolve(&self, name: &str, context: &EndpointContext) -> Option<Arc<dyn Endpoint>> {
        self.factories.get(name).map(|factory| factory(context))
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::built_in()
    }
}

/// Built-in `status` capability: answers `GET /status` with a small
/// JSON body and the tenant's headers.
struct StatusEndpoint {
    headers: HeaderMap,
}

#[async_trait]
impl Endpoint for StatusEndpoint {
    fn name(&self) -> &str {
        "status"
    }

    async fn accept(&self, request: &InboundRequest) -> EndpointResult<Option<Claim>> {
        if request.method == Method::GET && request.path() == "/status" {
            Ok(Some(Claim::new(())))
        } else {
            Ok(None)
        }
    }

    async fn handle(&self, claim: Claim) -> EndpointResult<Response> {
        claim.downcast::<()>()?;
        let body = serde_json::json!({ "status": "ok" }).to_string();
        let mut response = Response::new(Body::from(body));
        *response.headers_mut() = self.headers.clone();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(response)
    }
}
