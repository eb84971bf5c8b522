//! Directory walking and route table construction.
//!
//! # Responsibilities
//! - Walk a tenant's content tree, skipping dot entries and excludes
//! - Classify files against the compiled MIME rules
//! - Decide per file between in-memory caching and disk streaming
//! - Pre-compress cacheable bodies, preferring a `.br` sibling on disk
//! - Stamp `content-type`, `etag` and `content-length` on every entry
//!
//! # Design Decisions
//! - `index.html` maps to the directory's own URL, with a companion 308
//!   installed at the slashless form (the site root redirects to the
//!   canonical origin instead)
//! - ETags derive from mtime and size, so a touched file changes its
//!   ETag even when the bytes are equal
//! - The walk either returns a complete table or fails; a half-indexed
//!   directory never serves

use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue};
use thiserror::Error;
use tokio::fs;

use crate::content::entry::{BodySource, CacheEntry, RouteTable};
use crate::content::headers;
use crate::content::mime::{self, MimeRule};

/// Brotli effort for bodies compressed at indexing time.
const BROTLI_QUALITY: i32 = 9;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("computed an invalid header value for {path:?}")]
    Header { path: PathBuf },
}

/// Walk `root` and build the route table for one tenant.
///
/// `domain` is the canonical hostname (used by the site root redirect),
/// `prefix` the sanitized URL prefix (`""` serves at the domain root),
/// `base_headers` the merged default and tenant headers, and `excludes`
/// sanitized paths relative to `root` that must not be indexed.
pub async fn walk(
    root: &Path,
    domain: &str,
    prefix: &str,
    base_headers: &HeaderMap,
    rules: &[MimeRule],
    excludes: &HashSet<String>,
) -> Result<RouteTable, IndexError> {
    let started = SystemTime::now();
    let mut table = RouteTable::default();
    let mut pending = vec![(root.to_path_buf(), String::new())];

    while let Some((dir, rel)) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|source| IndexError::Io { path: dir.clone(), source })?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| IndexError::Io { path: dir.clone(), source })?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let rel_path = format!("{rel}/{name}");
            if excludes.contains(&rel_path) {
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .map_err(|source| IndexError::Io { path: entry.path(), source })?;
            if file_type.is_dir() {
                pending.push((entry.path(), rel_path));
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            let Some(rule) = mime::match_rule(rules, name) else {
                continue;
            };
            index_file(IndexedFile {
                path: entry.path(),
                name,
                dir: &dir,
                dir_prefix: format!("{prefix}{rel}"),
                url_path: format!("{prefix}{rel_path}"),
                domain,
                base_headers,
                rule,
                started,
            }, &mut table)
            .await?;
        }
    }
    Ok(table)
}

struct IndexedFile<'a> {
    path: PathBuf,
    name: &'a str,
    dir: &'a Path,
    /// URL of the containing directory; empty at the site root.
    dir_prefix: String,
    /// URL the file would get under the plain `{prefix}/{name}` scheme.
    url_path: String,
    domain: &'a str,
    base_headers: &'a HeaderMap,
    rule: &'a MimeRule,
    started: SystemTime,
}

async fn index_file(file: IndexedFile<'_>, table: &mut RouteTable) -> Result<(), IndexError> {
    let meta = fs::metadata(&file.path)
        .await
        .map_err(|source| IndexError::Io { path: file.path.clone(), source })?;
    let filesize = meta.len();

    // index.html serves the directory itself; the slashless form gets a
    // companion redirect, and the site root redirects to the canonical
    // origin.
    let key = if file.name == "index.html" {
        if file.dir_prefix.is_empty() {
            let location = header_value(format!("https://{}", file.domain), &file.path)?;
            table.insert("/", CacheEntry::redirect(file.base_headers.clone(), location));
            String::new()
        } else {
            let with_slash = format!("{}/", file.dir_prefix);
            let location = header_value(with_slash.clone(), &file.path)?;
            table.insert(
                file.dir_prefix.clone(),
                CacheEntry::redirect(file.base_headers.clone(), location),
            );
            with_slash
        }
    } else {
        file.url_path.clone()
    };

    let etag = entry_etag(&meta, file.started, filesize);
    let mut entry_headers = file.base_headers.clone();
    entry_headers.insert(header::CONTENT_TYPE, file.rule.content_type.clone());
    entry_headers.insert(header::ETAG, header_value(etag, &file.path)?);
    for (name, value) in file.rule.extra_headers.iter() {
        entry_headers.insert(name.clone(), value.clone());
    }

    let cache_body = file.rule.threshold.admits(filesize);
    let entry = if cache_body {
        let mut body = fs::read(&file.path)
            .await
            .map_err(|source| IndexError::Io { path: file.path.clone(), source })?;
        let mut compressed = false;
        if file.rule.compress {
            body = compressed_bytes(file.dir, file.name, body).await?;
            entry_headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("br"));
            compressed = true;
        }
        entry_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
        log_route(&key, filesize, body.len() as u64);
        CacheEntry {
            headers: entry_headers,
            status: None,
            body: Some(BodySource::Inline(Bytes::from(body))),
            compressed,
        }
    } else {
        entry_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(filesize));
        log_route(&key, filesize, filesize);
        CacheEntry {
            headers: entry_headers,
            status: None,
            body: Some(BodySource::File { path: file.path.clone(), size: filesize }),
            compressed: false,
        }
    };
    table.insert(key, entry);
    Ok(())
}

/// Compressed form of a cacheable body: a pre-compressed `{name}.br`
/// sibling wins, otherwise compress in process.
async fn compressed_bytes(
    dir: &Path,
    name: &str,
    body: Vec<u8>,
) -> Result<Vec<u8>, IndexError> {
    let sibling = dir.join(format!("{name}.br"));
    match fs::read(&sibling).await {
        Ok(precompressed) => Ok(precompressed),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let params = brotli::enc::BrotliEncoderParams {
                quality: BROTLI_QUALITY,
                ..Default::default()
            };
            let mut out = Vec::new();
            brotli::BrotliCompress(&mut Cursor::new(&body), &mut out, &params)
                .map_err(|source| IndexError::Io { path: dir.join(name), source })?;
            Ok(out)
        }
        Err(source) => Err(IndexError::Io { path: sibling, source }),
    }
}

/// `{mtime_millis:x}:{size:x}`; falls back to the walk's start time on
/// filesystems without mtime.
fn entry_etag(meta: &std::fs::Metadata, fallback: SystemTime, size: u64) -> String {
    let stamp = meta.modified().unwrap_or(fallback);
    let millis = stamp
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{millis:x}:{size:x}")
}

fn header_value(text: String, path: &Path) -> Result<HeaderValue, IndexError> {
    HeaderValue::from_str(&text).map_err(|_| IndexError::Header { path: path.to_path_buf() })
}

fn log_route(key: &str, size: u64, stored: u64) {
    let route = if key.is_empty() { "/" } else { key };
    tracing::info!(route = %route, size = size, stored = stored, "Indexed route");
}
