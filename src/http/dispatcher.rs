//! Request dispatch across a tenant's endpoint list.
//!
//! # Responsibilities
//! - Resolve the tenant for the request hostname
//! - Try each endpoint in order; the first claim wins
//! - Isolate endpoint failures (bad matcher skips, bad handler 500s)
//! - Record a request metric on every outcome

use std::time::Instant;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;

use crate::endpoint::InboundRequest;
use crate::observability::metrics;
use crate::routing::RoutingTable;

/// Walk the tenant's endpoints and produce the response.
///
/// An endpoint that claims the request owns it; a handler failure
/// turns into an empty 500 rather than a retry against later
/// endpoints. A failing `accept` only skips that endpoint.
pub async fn dispatch(table: &RoutingTable, request: InboundRequest, started: Instant) -> Response {
    let method = request.method.to_string();

    let Some(tenant) = table.lookup(request.hostname()) else {
        tracing::debug!(hostname = %request.hostname(), "No tenant for hostname");
        metrics::record_request(&method, 404, "none", started);
        return empty_response(StatusCode::NOT_FOUND);
    };

    for endpoint in &tenant.endpoints {
        let claim = match endpoint.accept(&request).await {
            Ok(Some(claim)) => claim,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(
                    endpoint = endpoint.name(),
                    error = %err,
                    "Endpoint accept failed, skipping"
                );
                continue;
            }
        };
        match endpoint.handle(claim).await {
            Ok(response) => {
                metrics::record_request(
                    &method,
                    response.status().as_u16(),
                    &tenant.name,
                    started,
                );
                return response;
            }
            Err(err) => {
                tracing::warn!(
                    endpoint = endpoint.name(),
                    error = %err,
                    "Endpoint handler failed"
                );
                metrics::record_request(&method, 500, &tenant.name, started);
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    metrics::record_request(&method, 404, &tenant.name, started);
    empty_response(StatusCode::NOT_FOUND)
}

pub(crate) fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
