//! HTTP server setup and request intake.
//!
//! # Responsibilities
//! - Create the Axum router and wire middleware (timeout, request ID,
//!   tracing)
//! - Reduce each inbound request to the form endpoints consume
//! - Hand requests to the dispatcher against the current routing table
//! - Bind the listener and drain gracefully on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::config::ServerConfig;
use crate::endpoint::InboundRequest;
use crate::http::dispatcher;
use crate::http::request;
use crate::observability::metrics;
use crate::routing::RoutingManager;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RoutingManager>,
}

/// HTTP server for the origin.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server around the shared routing state.
    pub fn new(config: &ServerConfig, manager: Arc<RoutingManager>) -> Self {
        let state = AppState { manager };
        let router = Self::build_router(config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(request::propagate_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(request::set_request_id())
    }

    /// Run the server, accepting connections on the given listener
    /// until the shutdown channel fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Terminal request handler: reduce, dispatch, respond.
async fn dispatch_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let started = Instant::now();
    let request_id = request
        .headers()
        .get(&request::X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let Some(inbound) = reduce_request(&request, addr) else {
        tracing::warn!(request_id = %request_id, "Request without a resolvable hostname");
        metrics::record_request(request.method().as_str(), 400, "none", started);
        return dispatcher::empty_response(StatusCode::BAD_REQUEST);
    };

    tracing::debug!(
        request_id = %request_id,
        method = %inbound.method,
        host = %inbound.hostname(),
        path = %inbound.path(),
        "Dispatching request"
    );

    let table = state.manager.table();
    dispatcher::dispatch(&table, inbound, started).await
}

/// Rebuild the request URL from the Host header (or the authority of
/// an absolute-form request line). The URL parser lowercases the
/// hostname, which is what the routing table is keyed on.
fn reduce_request(request: &Request<Body>, remote_addr: SocketAddr) -> Option<InboundRequest> {
    let authority = match request.uri().authority() {
        Some(authority) => authority.as_str(),
        None => request.headers().get(header::HOST)?.to_str().ok()?,
    };
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = Url::parse(&format!("http://{authority}{path_and_query}")).ok()?;
    Some(InboundRequest {
        method: request.method().clone(),
        headers: request.headers().clone(),
        url,
        remote_addr: Some(remote_addr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointRegistry;
    use axum::http::Method;
    use tower::ServiceExt;

    fn remote() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn test_router() -> Router {
        let config = ServerConfig::default();
        let manager = RoutingManager::new(
            config.content.root.clone(),
            config.management.domains.iter().cloned().collect(),
            EndpointRegistry::built_in(),
        );
        HttpServer::new(&config, manager).router
    }

    fn routed(host: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri("/");
        if let Some(host) = host {
            builder = builder.header(header::HOST, host);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request.extensions_mut().insert(ConnectInfo(remote()));
        request
    }

    #[tokio::test]
    async fn test_router_stamps_response_request_ids() {
        let router = test_router();
        let first = router.clone().oneshot(routed(Some("nowhere.local"))).await.unwrap();
        assert_eq!(first.status(), StatusCode::NOT_FOUND);
        let first_id = first.headers().get(&request::X_REQUEST_ID).unwrap().clone();

        let second = router.oneshot(routed(Some("nowhere.local"))).await.unwrap();
        let second_id = second.headers().get(&request::X_REQUEST_ID).unwrap();
        assert_ne!(&first_id, second_id);
    }

    #[tokio::test]
    async fn test_router_rejects_hostless_requests() {
        let router = test_router();
        let response = router.oneshot(routed(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(&request::X_REQUEST_ID).is_some());
    }

    fn origin_form(host: Option<&str>, target: &str) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(target);
        if let Some(host) = host {
            builder = builder.header(header::HOST, host);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_reduce_request_uses_host_header() {
        let request = origin_form(Some("WWW.Test.Local:8080"), "/example?x=1");
        let inbound = reduce_request(&request, remote()).unwrap();
        assert_eq!(inbound.hostname(), "www.test.local");
        assert_eq!(inbound.url.port(), Some(8080));
        assert_eq!(inbound.path(), "/example");
        assert_eq!(inbound.url.query(), Some("x=1"));
        assert_eq!(inbound.remote_addr, Some(remote()));
    }

    #[test]
    fn test_reduce_request_prefers_absolute_form_authority() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("http://test.local/docs/")
            .header(header::HOST, "other.local")
            .body(Body::empty())
            .unwrap();
        let inbound = reduce_request(&request, remote()).unwrap();
        assert_eq!(inbound.hostname(), "test.local");
    }

    #[test]
    fn test_request_without_host_is_rejected() {
        let request = origin_form(None, "/");
        assert!(reduce_request(&request, remote()).is_none());
    }

    #[test]
    fn test_garbage_host_is_rejected() {
        let request = origin_form(Some(""), "/");
        assert!(reduce_request(&request, remote()).is_none());
    }
}
