//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     path + handler + options
//!     → segment.rs (parse `(group)`, `:id`/`[id]`, `*rest`/`[...rest]`)
//!     → tree.rs (insert into the segment tree, reject duplicates)
//!     → Freeze as immutable Router
//!
//! Incoming Request (path):
//!     → tree.rs (static > dynamic > catch-all, with backtracking)
//!     → middleware.rs (enclosing layouts, then the route)
//!     → render pipeline, or a short-circuit response
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - Deterministic: same path always matches the same route
//! - Group segments structure the tree but never consume a URL segment
//! - Layout chains are computed once per node and reused

pub mod handler;
pub mod middleware;
pub mod router;
pub mod segment;
pub mod tree;

use thiserror::Error;

pub use handler::{layout_fn, page_fn, Handler, Layout, Page};
pub use middleware::{middleware_fn, ChainOutcome, Middleware, MiddlewareError, Next};
pub use router::{Router, RouterBuilder};
pub use tree::{RouteInfo, RouteMatch, RouteOptions, RouteTree};

/// Route registration failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("duplicate page handler for route \"{0}\"")]
    DuplicateRoute(String),

    #[error("duplicate layout handler for route \"{0}\"")]
    DuplicateLayout(String),

    #[error("route \"{path}\" adds catch-all \"{segment}\" next to existing catch-all \"{existing}\"")]
    MultipleCatchAll {
        path: String,
        segment: String,
        existing: String,
    },

    #[error("segment \"{segment}\" in route \"{path}\" has no parameter name")]
    MissingParamName { path: String, segment: String },

    #[error("route \"{path}\" binds parameter \"{param}\" more than once")]
    DuplicateParam { path: String, param: String },

    #[error("segment \"{segment}\" in route \"{path}\" cannot be a group")]
    InvalidGroup { path: String, segment: String },
}
