//! Static content endpoint over one tenant's indexed route table.
//!
//! # Responsibilities
//! - Redirect requests for non-canonical hostnames to the tenant's
//!   configured domain
//! - Resolve request paths against the route table built at load time
//! - Negotiate compression, restrict methods, answer conditional GETs
//! - Materialize streamed bodies, refusing files that changed on disk
//!
//! # Design Decisions
//! - `accept` precomputes the entire response as the claim; `handle`
//!   only turns it into wire form and opens files
//! - The canonical-domain check runs before the route lookup, so a
//!   wrong-host request redirects even for paths this tenant does not
//!   serve
//! - Stored redirect entries answer every method; the GET/HEAD
//!   restriction applies to content entries only

use std::collections::HashSet;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::content::{BodySource, RouteTable};
use crate::endpoint::{Claim, Endpoint, EndpointError, EndpointResult, InboundRequest};

/// Serves one tenant's static tree, authoritative for `domain`.
pub struct StaticEndpoint {
    name: String,
    routes: RouteTable,
    domain: String,
    /// Hostnames exempt from the canonical redirect.
    local_domains: HashSet<String>,
    /// Merged default and tenant headers, used on responses that carry
    /// no cache entry of their own.
    base_headers: HeaderMap,
}

/// Precomputed response carried from `accept` to `handle`.
#[derive(Debug)]
struct ResponsePlan {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<BodySource>,
}

impl StaticEndpoint {
    pub fn new(
        prefix: &str,
        routes: RouteTable,
        domain: String,
        local_domains: HashSet<String>,
        base_headers: HeaderMap,
    ) -> Self {
        Self {
            name: format!("{prefix}/{{files}}"),
            routes,
            domain,
            local_domains,
            base_headers,
        }
    }

    /// 308 to the same URL with the hostname swapped for the canonical
    /// domain; scheme, port, path and query are preserved.
    fn canonical_redirect(&self, request: &InboundRequest) -> EndpointResult<ResponsePlan> {
        let mut target = request.url.clone();
        if target.set_host(Some(&self.domain)).is_err() {
            return Err(EndpointError::Redirect {
                location: self.domain.clone(),
            });
        }
        let location = target.to_string();
        let mut headers = self.base_headers.clone();
        headers.insert(
            header::LOCATION,
            HeaderValue::from_str(&location)
                .map_err(|_| EndpointError::Redirect { location })?,
        );
        Ok(ResponsePlan {
            status: StatusCode::PERMANENT_REDIRECT,
            headers,
            body: None,
        })
    }

    fn plan(&self, request: &InboundRequest) -> EndpointResult<Option<ResponsePlan>> {
        let hostname = request.hostname();
        if hostname != self.domain && !self.local_domains.contains(hostname) {
            return self.canonical_redirect(request).map(Some);
        }
        let Some(entry) = self.routes.lookup(request.path()) else {
            return Ok(None);
        };
        let plan = if entry.compressed && !accepts_brotli(&request.headers) {
            ResponsePlan {
                status: StatusCode::NOT_ACCEPTABLE,
                headers: self.base_headers.clone(),
                body: None,
            }
        } else if let Some(status) = entry.status {
            ResponsePlan {
                status,
                headers: entry.headers.clone(),
                body: None,
            }
        } else if request.method != Method::GET && request.method != Method::HEAD {
            let mut headers = HeaderMap::new();
            headers.insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            ResponsePlan {
                status: StatusCode::METHOD_NOT_ALLOWED,
                headers,
                body: None,
            }
        } else if not_modified(&request.headers, entry.etag()) {
            ResponsePlan {
                status: StatusCode::NOT_MODIFIED,
                headers: entry.headers.clone(),
                body: None,
            }
        } else {
            let body = if request.method == Method::GET {
                entry.body.clone()
            } else {
                None
            };
            ResponsePlan {
                status: StatusCode::OK,
                headers: entry.headers.clone(),
                body,
            }
        };
        Ok(Some(plan))
    }
}

#[async_trait]
impl Endpoint for StaticEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn accept(&self, request: &InboundRequest) -> EndpointResult<Option<Claim>> {
        Ok(self.plan(request)?.map(Claim::new))
    }

    async fn handle(&self, claim: Claim) -> EndpointResult<Response> {
        let plan = claim.downcast::<ResponsePlan>()?;
        let body = match plan.body {
            None => Body::empty(),
            Some(BodySource::Inline(bytes)) => Body::from(bytes),
            Some(BodySource::File { path, size }) => {
                let file = File::open(&path).await.map_err(|source| EndpointError::Io {
                    path: path.clone(),
                    source,
                })?;
                let meta = file.metadata().await.map_err(|source| EndpointError::Io {
                    path: path.clone(),
                    source,
                })?;
                if meta.len() != size {
                    return Err(EndpointError::Stale { path });
                }
                Body::from_stream(ReaderStream::new(file))
            }
        };
        let mut response = Response::new(body);
        *response.status_mut() = plan.status;
        *response.headers_mut() = plan.headers;
        Ok(response)
    }
}

/// Whether the client negotiated brotli. Token containment only,
/// q-values are not parsed.
fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("br"))
}

fn not_modified(headers: &HeaderMap, etag: Option<&HeaderValue>) -> bool {
    match (headers.get(header::IF_NONE_MATCH), etag) {
        (Some(sent), Some(current)) => sent == current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::headers::default_headers;
    use crate::content::CacheEntry;
    use axum::body::Bytes;
    use url::Url;

    fn content_entry(content_type: &'static str, etag: &'static str, body: &'static [u8]) -> CacheEntry {
        let mut headers = default_headers();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(header::ETAG, HeaderValue::from_static(etag));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
        CacheEntry {
            headers,
            status: None,
            body: Some(BodySource::Inline(Bytes::from_static(body))),
            compressed: false,
        }
    }

    fn endpoint() -> StaticEndpoint {
        let mut routes = RouteTable::default();
        routes.insert("", content_entry("text/html; charset=utf-8", "\"a1:5\"", b"<html>home</html>"));
        routes.insert(
            "/deno.svg",
            content_entry("image/svg+xml", "a2:b", b"<svg></svg>"),
        );
        routes.insert(
            "/docs",
            CacheEntry::redirect(default_headers(), HeaderValue::from_static("/docs/")),
        );
        let mut compressed = content_entry("text/css; charset=utf-8", "a3:6", b"br-bytes");
        compressed.headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("br"));
        compressed.compressed = true;
        routes.insert("/app.css", compressed);

        StaticEndpoint::new(
            "",
            routes,
            "www.test.local".to_string(),
            ["localhost", "127.0.0.1", "::1"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            default_headers(),
        )
    }

    fn request(method: Method, url: &str, headers: &[(&str, &str)]) -> InboundRequest {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        InboundRequest {
            method,
            headers: map,
            url: Url::parse(url).unwrap(),
            remote_addr: None,
        }
    }

    async fn respond(endpoint: &StaticEndpoint, request: InboundRequest) -> Response {
        let claim = endpoint.accept(&request).await.unwrap().expect("claimed");
        endpoint.handle(claim).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn test_serves_cached_file() {
        let endpoint = endpoint();
        let response = respond(
            &endpoint,
            request(Method::GET, "http://www.test.local/deno.svg", &[]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "image/svg+xml");
        assert_eq!(response.headers().get("etag").unwrap(), "a2:b");
        assert_eq!(body_bytes(response).await.as_ref(), b"<svg></svg>");
    }

    #[tokio::test]
    async fn test_head_mirrors_get_without_body() {
        let endpoint = endpoint();
        let response = respond(
            &endpoint,
            request(Method::HEAD, "http://www.test.local/deno.svg", &[]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("etag").unwrap(), "a2:b");
        assert_eq!(response.headers().get("content-length").unwrap(), "11");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_host_redirects_to_canonical_domain() {
        let endpoint = endpoint();
        let response = respond(
            &endpoint,
            request(Method::GET, "http://test.local:4507/missing?x=1", &[]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "http://www.test.local:4507/missing?x=1"
        );
    }

    #[tokio::test]
    async fn test_local_alias_serves_without_redirect() {
        let endpoint = endpoint();
        let response = respond(
            &endpoint,
            request(Method::GET, "http://localhost/deno.svg", &[]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_claimed() {
        let endpoint = endpoint();
        let claim = endpoint
            .accept(&request(Method::GET, "http://www.test.local/missing", &[]))
            .await
            .unwrap();
        assert!(claim.is_none());
    }

    #[tokio::test]
    async fn test_root_path_resolves_canonical_key() {
        let endpoint = endpoint();
        let response = respond(&endpoint, request(Method::GET, "http://www.test.local/", &[])).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.as_ref(), b"<html>home</html>");
    }

    #[tokio::test]
    async fn test_matching_if_none_match_returns_304() {
        let endpoint = endpoint();
        let response = respond(
            &endpoint,
            request(
                Method::GET,
                "http://www.test.local/deno.svg",
                &[("if-none-match", "a2:b")],
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers().get("etag").unwrap(), "a2:b");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_if_none_match_returns_body() {
        let endpoint = endpoint();
        let response = respond(
            &endpoint,
            request(
                Method::GET,
                "http://www.test.local/deno.svg",
                &[("if-none-match", "old:1")],
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.as_ref(), b"<svg></svg>");
    }

    #[tokio::test]
    async fn test_compressed_entry_requires_brotli() {
        let endpoint = endpoint();
        let refused = respond(
            &endpoint,
            request(Method::GET, "http://www.test.local/app.css", &[]),
        )
        .await;
        assert_eq!(refused.status(), StatusCode::NOT_ACCEPTABLE);
        assert!(body_bytes(refused).await.is_empty());

        let head = respond(
            &endpoint,
            request(
                Method::HEAD,
                "http://www.test.local/app.css",
                &[("accept-encoding", "gzip")],
            ),
        )
        .await;
        assert_eq!(head.status(), StatusCode::NOT_ACCEPTABLE);

        let served = respond(
            &endpoint,
            request(
                Method::GET,
                "http://www.test.local/app.css",
                &[("accept-encoding", "gzip, br")],
            ),
        )
        .await;
        assert_eq!(served.status(), StatusCode::OK);
        assert_eq!(served.headers().get("content-encoding").unwrap(), "br");
        assert_eq!(body_bytes(served).await.as_ref(), b"br-bytes");
    }

    #[tokio::test]
    async fn test_post_gets_405_with_allow() {
        let endpoint = endpoint();
        let response = respond(
            &endpoint,
            request(Method::POST, "http://www.test.local/deno.svg", &[]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get("allow").unwrap(), "GET, HEAD");
    }

    #[tokio::test]
    async fn test_redirect_entry_answers_any_method() {
        let endpoint = endpoint();
        let response = respond(
            &endpoint,
            request(Method::POST, "http://www.test.local/docs", &[]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(response.headers().get("location").unwrap(), "/docs/");
    }

    #[tokio::test]
    async fn test_streamed_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"movie-bytes").unwrap();

        let mut routes = RouteTable::default();
        let mut entry = content_entry("video/mp4", "a4:b", b"");
        entry.headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("11"));
        entry.body = Some(BodySource::File { path: path.clone(), size: 11 });
        routes.insert("/clip.mp4", entry);
        let endpoint = StaticEndpoint::new(
            "",
            routes,
            "www.test.local".to_string(),
            HashSet::new(),
            default_headers(),
        );

        let response = respond(
            &endpoint,
            request(Method::GET, "http://www.test.local/clip.mp4", &[]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.as_ref(), b"movie-bytes");
    }

    #[tokio::test]
    async fn test_resized_file_fails_instead_of_serving() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"grew after indexing").unwrap();

        let mut routes = RouteTable::default();
        let mut entry = content_entry("video/mp4", "a5:b", b"");
        entry.body = Some(BodySource::File { path, size: 4 });
        routes.insert("/clip.mp4", entry);
        let endpoint = StaticEndpoint::new(
            "",
            routes,
            "www.test.local".to_string(),
            HashSet::new(),
            default_headers(),
        );

        let claim = endpoint
            .accept(&request(Method::GET, "http://www.test.local/clip.mp4", &[]))
            .await
            .unwrap()
            .expect("claimed");
        assert!(matches!(
            endpoint.handle(claim).await,
            Err(EndpointError::Stale { .. })
        ));
    }
}
