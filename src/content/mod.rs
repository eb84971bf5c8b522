//! Static content subsystem.
//!
//! # Data Flow
//! ```text
//! tenant directory on disk
//!     → indexer.rs (walk tree, classify via mime.rs rules)
//!     → per file: cache policy via threshold.rs
//!     → headers assembled via headers.rs (merged, case-insensitive)
//!     → entry.rs CacheEntry (inline bytes or lazy file source)
//!     → RouteTable (path → entry), immutable once returned
//! ```
//!
//! # Design Decisions
//! - A RouteTable is built in one pass and never mutated afterwards;
//!   reindexing produces a new table
//! - Files matching no MIME rule are invisible (not served, not an error)
//! - Any I/O failure aborts the whole walk; no partial table escapes

pub mod entry;
pub mod headers;
pub mod indexer;
pub mod mime;
pub mod path;
pub mod threshold;

pub use entry::{BodySource, CacheEntry, RouteTable};
pub use indexer::IndexError;
pub use threshold::CacheThreshold;
