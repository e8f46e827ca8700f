//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Register pages
//!     → preload.rs (warm cache) → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listener
//! - The cache is warm before the first request is accepted

pub mod preload;
pub mod shutdown;
pub mod signals;

pub use preload::{preload_all, PreloadReport};
pub use shutdown::Shutdown;
