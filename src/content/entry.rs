//! Cache entries and the route table they live in.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

/// Where a route's bytes come from at serve time.
#[derive(Debug, Clone)]
pub enum BodySource {
    /// Bytes held in memory, possibly pre-compressed.
    Inline(Bytes),
    /// Re-opened and streamed from disk on every request. `size` is the
    /// size at indexing time; a mismatch at serve time means the entry
    /// is stale.
    File { path: PathBuf, size: u64 },
}

/// One precomputed response: headers plus either a body or a terminal
/// status (redirects carry `status` and no body).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub headers: HeaderMap,
    pub status: Option<StatusCode>,
    pub body: Option<BodySource>,
    pub compressed: bool,
}

impl CacheEntry {
    /// A permanent redirect to `location`, carrying the tenant's base
    /// headers.
    pub fn redirect(mut headers: HeaderMap, location: HeaderValue) -> Self {
        headers.insert(header::LOCATION, location);
        Self {
            headers,
            status: Some(StatusCode::PERMANENT_REDIRECT),
            body: None,
            compressed: false,
        }
    }

    pub fn etag(&self) -> Option<&HeaderValue> {
        self.headers.get(header::ETAG)
    }
}

/// Immutable path → entry mapping for one tenant's static tree.
///
/// Keys are canonical: the directory root is the empty string, a
/// directory's own page is `{prefix}/`, and files are `{prefix}/{name}`.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Arc<CacheEntry>>,
}

impl RouteTable {
    pub fn insert(&mut self, path: impl Into<String>, entry: CacheEntry) {
        self.routes.insert(path.into(), Arc::new(entry));
    }

    /// Look up a request path. `/` maps to the canonical root key.
    pub fn lookup(&self, path: &str) -> Option<&Arc<CacheEntry>> {
        let key = if path == "/" { "" } else { path };
        self.routes.get(key)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<CacheEntry>)> {
        self.routes.iter().map(|(path, entry)| (path.as_str(), entry))
    }
}
