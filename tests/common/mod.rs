//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use multihost::config::ServerConfig;
use multihost::endpoint::EndpointRegistry;
use multihost::lifecycle::Shutdown;
use multihost::routing::RoutingManager;
use multihost::HttpServer;
use tokio::net::TcpListener;

/// A running origin bound to an ephemeral port.
pub struct TestOrigin {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

/// Write one tenant directory with its config and content files.
pub fn write_tenant(root: &Path, name: &str, config: &str, files: &[(&str, &[u8])]) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("directory.json"), config).unwrap();
    for (rel, bytes) in files {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, bytes).unwrap();
    }
}

/// The `example` fixture: two hostnames, canonical `www.test.local`,
/// content served under `/example`.
pub fn write_example_site(root: &Path) {
    write_tenant(
        root,
        "example",
        r#"{
  "domains": ["www.test.local", "test.local"],
  "headers": {"x-powered-by": "multihost"},
  "static": {"domain": "www.test.local"}
}"#,
        &[
            (
                "index.html",
                b"<html><body>Hello example</body></html>" as &[u8],
            ),
            (
                "deno.svg",
                b"<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>",
            ),
            ("pixel.png", b"\x89PNG\r\n\x1a\nfakepixels"),
        ],
    );
}

/// Boot an origin over `root` and serve it on an ephemeral port.
pub async fn spawn_origin(root: &Path) -> TestOrigin {
    let mut config = ServerConfig::default();
    config.content.root = root.to_path_buf();

    let manager = RoutingManager::new(
        config.content.root.clone(),
        config.management.domains.iter().cloned().collect(),
        EndpointRegistry::built_in(),
    );
    manager.load_initial().await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let server = HttpServer::new(&config, manager);
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    TestOrigin { addr, shutdown }
}

/// Client with the test hostnames pinned to the origin and redirects
/// left to the caller.
pub fn client(origin: &TestOrigin) -> reqwest::Client {
    reqwest::Client::builder()
        .resolve("www.test.local", origin.addr)
        .resolve("test.local", origin.addr)
        .resolve("www.second.local", origin.addr)
        .resolve("unknown.local", origin.addr)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

pub fn url(origin: &TestOrigin, host: &str, path: &str) -> String {
    format!("http://{}:{}{}", host, origin.addr.port(), path)
}

/// Decode a brotli response body.
pub fn decode_br(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    brotli::BrotliDecompress(&mut std::io::Cursor::new(body), &mut out).unwrap();
    out
}
