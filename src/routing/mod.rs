//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Boot / reload trigger
//!     → builder.rs (scan tenant directories, index content,
//!       resolve endpoint capabilities)
//!     → state.rs (DirectoryState per tenant, composed RoutingTable)
//!     → manager.rs (atomic table swap, single-flight reloads)
//!
//! Request path:
//!     hostname → manager.table() → DirectoryState.endpoints
//! ```
//!
//! # Design Decisions
//! - Tables are immutable once composed; a reload builds a fresh table
//!   and swaps the shared pointer
//! - A hostname belongs to at most one tenant; collisions fail the
//!   whole rebuild and leave the old table serving
//! - Management hostnames are always present, bound to the reload
//!   endpoints instead of tenant content

pub mod builder;
pub mod manager;
pub mod state;

pub use builder::BuildError;
pub use manager::{ReloadOutcome, RoutingManager};
pub use state::{DirectoryState, RoutingTable};
