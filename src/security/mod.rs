//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (body size limit)
//!     → application
//!     → headers.rs (security response headers)
//! ```
//!
//! # Design Decisions
//! - Output is always escaped before it reaches HTML (see render::document)
//! - No trust in client input: bodies are size-capped before parsing

pub mod headers;
