//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! server config (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → consumed once at startup
//!
//! per tenant, at boot and on reload:
//!     <tenant>/directory.json
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DirectoryConfig → routing::builder
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; tenant changes go through the
//!   reload endpoints, server changes require a restart
//! - All server fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::DirectoryConfig;
pub use schema::ServerConfig;
pub use schema::StaticConfig;
