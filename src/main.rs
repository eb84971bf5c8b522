//! Multi-tenant static origin server.
//!
//! One process serves many sites. Each tenant is a directory under the
//! content root with a `directory.json` declaring its hostnames; the
//! server indexes the directory tree up front and answers requests
//! from the in-memory table. Management hostnames expose reload
//! triggers that re-index without a restart.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────┐
//!                   │                  ORIGIN SERVER                   │
//!                   │                                                  │
//!   Client Request  │  ┌─────────┐   ┌────────────┐   ┌────────────┐  │
//!   ────────────────┼─▶│  http   │──▶│ dispatcher │──▶│  routing   │  │
//!                   │  │ server  │   │  (accept/  │   │   table    │  │
//!                   │  └─────────┘   │   handle)  │   └─────┬──────┘  │
//!                   │                └────────────┘         │         │
//!                   │                                       ▼         │
//!                   │              ┌──────────────────────────────┐   │
//!                   │              │   tenant endpoint lists      │   │
//!                   │              │  static files │ reload │ ... │   │
//!                   │              └──────────────────────────────┘   │
//!                   │                                                 │
//!                   │  ┌───────────────────────────────────────────┐  │
//!                   │  │           Cross-Cutting Concerns          │  │
//!                   │  │  ┌────────┐ ┌─────────┐ ┌──────────────┐  │  │
//!                   │  │  │ config │ │ content │ │observability │  │  │
//!                   │  │  │        │ │ indexer │ │ logs/metrics │  │  │
//!                   │  │  └────────┘ └─────────┘ └──────────────┘  │  │
//!                   │  │  ┌─────────────────────────────────────┐  │  │
//!                   │  │  │      lifecycle (shutdown drain)     │  │  │
//!                   │  │  └─────────────────────────────────────┘  │  │
//!                   │  └───────────────────────────────────────────┘  │
//!                   └──────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use multihost::config::{loader, ServerConfig};
use multihost::endpoint::EndpointRegistry;
use multihost::lifecycle::{shutdown, Shutdown};
use multihost::observability::metrics;
use multihost::routing::RoutingManager;
use multihost::HttpServer;

const DEFAULT_CONFIG: &str = "origin.toml";

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "multihost", about = "Multi-tenant static origin server", version)]
struct Args {
    /// Path to the server configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address (e.g. "127.0.0.1:8080").
    #[arg(short, long)]
    listen: Option<String>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Log level override; `None` falls back to the configured level.
    fn log_level(&self) -> Option<&'static str> {
        if self.quiet {
            return Some("error");
        }
        match self.verbose {
            0 => None,
            1 => Some("info"),
            2 => Some("debug"),
            _ => Some("trace"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // An explicit --config must load; the default path is optional.
    let mut config = match &args.config {
        Some(path) => loader::load_server_config(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            loader::load_server_config(Path::new(DEFAULT_CONFIG))?
        }
        None => ServerConfig::default(),
    };
    if let Some(listen) = &args.listen {
        config.listener.bind_address = listen.clone();
    }

    // Initialize tracing subscriber
    let filter = match args.log_level() {
        Some(level) => format!("multihost={level},tower_http={level}"),
        None => format!(
            "multihost={},tower_http=debug",
            config.observability.log_level
        ),
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("multihost v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        content_root = %config.content.root.display(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let manager = RoutingManager::new(
        config.content.root.clone(),
        config.management.domains.iter().cloned().collect(),
        EndpointRegistry::built_in(),
    );
    manager.load_initial().await?;

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        address = %local_addr,
        "Listening for connections"
    );

    // Initialize metrics server
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let stop = Shutdown::new();
    tokio::spawn(shutdown::trigger_on_ctrl_c(stop.clone()));

    // Create and run HTTP server
    let server = HttpServer::new(&config, manager);
    server.run(listener, stop.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
