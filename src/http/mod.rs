//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, static files)
//!     → request.rs (request context: path, query, headers, request ID)
//!     → GET/HEAD: router → render pipeline
//!     → POST/PATCH: action.rs (JSON in, JSON out, cache invalidation)
//!     → response.rs (content type, status)
//!     → Send to client
//! ```

pub mod action;
pub mod request;
pub mod response;
pub mod server;

pub use action::{action_fn, Action, ActionError, ActionOutcome, ActionRegistry};
pub use request::{RequestContext, X_REQUEST_ID};
pub use server::HttpServer;
