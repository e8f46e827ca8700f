//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! User callback (server data, page handler, render engine):
//!     → timeouts.rs (enforce per-callback deadline)
//!     → On timeout: degrade (no data) or fail the request (500)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every user callback has a deadline
//! - Cache population is best-effort and bounded by size, not time

pub mod timeouts;
