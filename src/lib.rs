//! Multi-tenant static origin server library.

pub mod config;
pub mod content;
pub mod endpoint;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::RoutingManager;
