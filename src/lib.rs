//! Server-side render runtime library.
//!
//! Routes requests through a segment-tree router, renders pages through a
//! streaming pipeline, and caches rendered payloads in a bounded LRU.

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pages;
pub mod render;
pub mod resilience;
pub mod routing;
pub mod runtime;
pub mod security;

pub use config::schema::RuntimeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use runtime::Runtime;
