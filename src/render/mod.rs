//! Render subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route + request:
//!     → pipeline.rs (cache lookup, ETag check)
//!     → [miss] server data ∥ layout chain
//!     → page handler → layouts (innermost first) → engine.rs (ViewNode → byte stream)
//!     → tee.rs (live branch, cache branch)
//!     → document.rs (head + live chunks + tail) → client
//!     → cache branch → response cache (background)
//! ```
//!
//! # Design Decisions
//! - Errors before the first byte produce a 500 page; after it, the stream ends early
//! - Cache fills never delay the client response
//! - A slow client never stalls the cache fill beyond the live buffer

pub mod document;
pub mod engine;
pub mod pipeline;
pub mod tee;
pub mod view;

use thiserror::Error;

use crate::resilience::timeouts::TimeoutError;

pub use document::Document;
pub use engine::{ByteStream, HtmlEngine, RenderEngine};
pub use pipeline::{RenderPipeline, Rendered};
pub use view::ViewNode;

/// Rendering a page failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("server data failed: {0}")]
    Data(String),

    #[error("page handler failed: {0}")]
    Handler(String),

    #[error("render engine failed: {0}")]
    Engine(String),

    #[error("render stream failed: {0}")]
    Stream(String),

    #[error("rendered payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}
