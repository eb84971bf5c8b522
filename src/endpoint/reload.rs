//! Management endpoints that trigger routing rebuilds.
//!
//! Both hold a weak handle to the routing manager; the manager owns
//! them through the management directory, so a strong handle here
//! would be a reference cycle.

use std::sync::Weak;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::Response;

use crate::endpoint::{Claim, Endpoint, EndpointError, EndpointResult, InboundRequest};
use crate::routing::{ReloadOutcome, RoutingManager};

/// `GET /update` rebuilds every tenant directory.
pub struct UpdateAllEndpoint {
    manager: Weak<RoutingManager>,
}

impl UpdateAllEndpoint {
    pub(crate) fn new(manager: Weak<RoutingManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Endpoint for UpdateAllEndpoint {
    fn name(&self) -> &str {
        "/update"
    }

    async fn accept(&self, request: &InboundRequest) -> EndpointResult<Option<Claim>> {
        if request.method != Method::GET || request.path() != "/update" {
            return Ok(None);
        }
        Ok(Some(Claim::new(())))
    }

    async fn handle(&self, claim: Claim) -> EndpointResult<Response> {
        claim.downcast::<()>()?;
        let manager = self.manager.upgrade().ok_or(EndpointError::Unavailable)?;
        match manager.rebuild_all().await? {
            ReloadOutcome::Updated => Ok(text_response("Updated all")),
            ReloadOutcome::Busy => Ok(status_response(StatusCode::TOO_MANY_REQUESTS)),
        }
    }
}

/// `GET /update/{directory}` rebuilds a single tenant directory.
///
/// Only directories present in the current table are claimed; anything
/// else falls through to the dispatcher's not-found response.
pub struct UpdateDirectoryEndpoint {
    manager: Weak<RoutingManager>,
}

impl UpdateDirectoryEndpoint {
    pub(crate) fn new(manager: Weak<RoutingManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Endpoint for UpdateDirectoryEndpoint {
    fn name(&self) -> &str {
        "/update/{directory}"
    }

    async fn accept(&self, request: &InboundRequest) -> EndpointResult<Option<Claim>> {
        if request.method != Method::GET {
            return Ok(None);
        }
        let Some(name) = request.path().strip_prefix("/update/") else {
            return Ok(None);
        };
        if name.is_empty() || name.contains('/') {
            return Ok(None);
        }
        let Some(manager) = self.manager.upgrade() else {
            return Ok(None);
        };
        if !manager.knows_directory(name) {
            return Ok(None);
        }
        Ok(Some(Claim::new(name.to_string())))
    }

    async fn handle(&self, claim: Claim) -> EndpointResult<Response> {
        let name = claim.downcast::<String>()?;
        let manager = self.manager.upgrade().ok_or(EndpointError::Unavailable)?;
        match manager.rebuild_directory(&name).await? {
            ReloadOutcome::Updated => Ok(text_response(&format!("Updated {name}"))),
            ReloadOutcome::Busy => Ok(status_response(StatusCode::TOO_MANY_REQUESTS)),
        }
    }
}

fn text_response(body: &str) -> Response {
    let mut response = Response::new(Body::from(body.to_string()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn status_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointRegistry;
    use crate::routing::RoutingManager;
    use axum::http::HeaderMap;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;
    use url::Url;

    fn get(url: &str) -> InboundRequest {
        InboundRequest {
            method: Method::GET,
            headers: HeaderMap::new(),
            url: Url::parse(url).unwrap(),
            remote_addr: None,
        }
    }

    async fn manager_with_example(root: &TempDir) -> Arc<RoutingManager> {
        let dir = root.path().join("example");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("directory.json"),
            r#"{"domains": ["www.test.local"], "static": {"domain": "www.test.local"}}"#,
        )
        .unwrap();
        fs::write(dir.join("index.html"), "<html></html>").unwrap();
        let manager = RoutingManager::new(
            root.path().to_path_buf(),
            HashSet::from(["localhost".to_string()]),
            EndpointRegistry::built_in(),
        );
        manager.load_initial().await.unwrap();
        manager
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_update_all_accepts_only_exact_path() {
        let endpoint = UpdateAllEndpoint::new(Weak::new());
        assert!(endpoint
            .accept(&get("http://localhost/update"))
            .await
            .unwrap()
            .is_some());
        for url in [
            "http://localhost/update/",
            "http://localhost/updates",
            "http://localhost/status",
        ] {
            assert!(endpoint.accept(&get(url)).await.unwrap().is_none(), "{url}");
        }
        let mut post = get("http://localhost/update");
        post.method = Method::POST;
        assert!(endpoint.accept(&post).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_directory_claims_known_directories_only() {
        let root = TempDir::new().unwrap();
        let manager = manager_with_example(&root).await;
        let endpoint = UpdateDirectoryEndpoint::new(Arc::downgrade(&manager));

        let claim = endpoint
            .accept(&get("http://localhost/update/example"))
            .await
            .unwrap()
            .expect("known directory");
        assert_eq!(claim.downcast::<String>().unwrap(), "example");

        for url in [
            "http://localhost/update/ghost",
            "http://localhost/update/",
            "http://localhost/update/example/nested",
            "http://localhost/update",
        ] {
            assert!(endpoint.accept(&get(url)).await.unwrap().is_none(), "{url}");
        }
    }

    #[tokio::test]
    async fn test_update_all_reports_what_it_did() {
        let root = TempDir::new().unwrap();
        let manager = manager_with_example(&root).await;
        let endpoint = UpdateAllEndpoint::new(Arc::downgrade(&manager));

        let response = endpoint.handle(Claim::new(())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Updated all");
    }

    #[tokio::test]
    async fn test_update_directory_reports_what_it_did() {
        let root = TempDir::new().unwrap();
        let manager = manager_with_example(&root).await;
        let endpoint = UpdateDirectoryEndpoint::new(Arc::downgrade(&manager));

        let response = endpoint
            .handle(Claim::new("example".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Updated example");
    }

    #[tokio::test]
    async fn test_update_rejected_after_manager_dropped() {
        let endpoint = UpdateAllEndpoint::new(Weak::new());
        assert!(matches!(
            endpoint.handle(Claim::new(())).await,
            Err(EndpointError::Unavailable)
        ));
    }
}
