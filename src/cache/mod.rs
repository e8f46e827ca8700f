//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Request (method, path, query)
//!     → response.rs (cache_key)
//!     → lookup: hit → payload + ETag served inside the document envelope
//!               miss → render pipeline streams, then fills the cache
//!
//! Storage:
//!     response.rs (Mutex, metrics, invalidation, sweep)
//!     → lru.rs (slot arena + recency list + lazy TTL)
//! ```
//!
//! # Design Decisions
//! - Capacity and TTL fixed at construction
//! - Expiration is lazy; the periodic sweep only trims memory
//! - The envelope is never part of a cached payload

pub mod lru;
pub mod response;

pub use lru::{CacheStats, LruCache};
pub use response::{cache_key, CachedPayload, ResponseCache};
