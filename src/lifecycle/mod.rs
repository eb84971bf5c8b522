//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Build routing manager → Initial index → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or programmatic trigger → Stop accepting → Drain → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then routing state, then listener
//! - The serve loop owns draining; everything else only triggers

pub mod shutdown;

pub use shutdown::Shutdown;
