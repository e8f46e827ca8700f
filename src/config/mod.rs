//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), optional
//!     → loader.rs (parse & deserialize, PORT override)
//!     → validation.rs (semantic checks)
//!     → RuntimeConfig (validated, immutable)
//!     → handed to subsystems at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; cache capacity and TTL never change at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{default_config, load_config, ConfigError};
pub use schema::{
    CacheConfig, DataTimeoutPolicy, DocumentConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, PreloadConfig, PreloadSample, RenderConfig, RuntimeConfig,
    SecurityConfig, StaticFilesConfig, TimeoutConfig,
};
