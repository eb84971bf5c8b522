//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, URL and hostname recovery)
//!     → request.rs (stamp x-request-id)
//!     → dispatcher.rs (tenant lookup, endpoint accept/handle loop)
//!     → Response sent to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
