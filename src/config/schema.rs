//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the runtime.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the render runtime.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Response cache sizing and expiry.
    pub cache: CacheConfig,

    /// Render pipeline behaviour.
    pub render: RenderConfig,

    /// Document envelope settings.
    pub document: DocumentConfig,

    /// Static asset responder.
    pub static_files: StaticFilesConfig,

    /// Startup cache warm-up.
    pub preload: PreloadConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security hardening settings.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration for the request and its user callbacks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time to produce response headers) in seconds.
    pub request_secs: u64,

    /// Bound on a route's server-data provider, in milliseconds.
    pub server_data_ms: u64,

    /// Bound on the page handler and on the render engine, each, in milliseconds.
    pub render_ms: u64,
}

impl TimeoutConfig {
    pub fn server_data(&self) -> Duration {
        Duration::from_millis(self.server_data_ms)
    }

    pub fn render(&self) -> Duration {
        Duration::from_millis(self.render_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            server_data_ms: 1000,
            render_ms: 1200,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached pages.
    pub capacity: usize,

    /// Time-to-live of a cached page in seconds.
    pub ttl_secs: u64,

    /// Cache-fill branch stops buffering (and gives up) past this many bytes.
    pub max_payload_bytes: usize,

    /// Payloads smaller than this are not worth caching.
    pub min_payload_bytes: usize,

    /// Interval of the background expiry sweep in seconds (0 = disabled).
    pub sweep_interval_secs: u64,

    /// Entries inspected per sweep.
    pub sweep_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_secs: 300,
            max_payload_bytes: 128 * 1024,
            min_payload_bytes: 0,
            sweep_interval_secs: 60,
            sweep_batch: 64,
        }
    }
}

/// What to do when a server-data provider misses its deadline.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataTimeoutPolicy {
    /// Render the page without data.
    #[default]
    Degrade,
    /// Fail the request with a 500 page.
    Fail,
}

/// Render pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Policy applied when server data times out.
    pub on_data_timeout: DataTimeoutPolicy,

    /// Chunks buffered ahead of the client on the live branch.
    pub live_buffer_chunks: usize,

    /// Cache-Control header for rendered pages.
    pub cache_control: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            on_data_timeout: DataTimeoutPolicy::Degrade,
            live_buffer_chunks: 16,
            cache_control: "public, max-age=3600, stale-while-revalidate=59".to_string(),
        }
    }
}

/// Document envelope configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Page title placed in the head.
    pub title: String,

    /// Stylesheet URL loaded without blocking render.
    pub stylesheet: Option<String>,

    /// Environment variables with this prefix are exposed to the client.
    pub public_env_prefix: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            title: "render-runtime".to_string(),
            stylesheet: Some("/main.css".to_string()),
            public_env_prefix: "APP_PUBLIC_".to_string(),
        }
    }
}

/// Static asset responder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Serve files from `root` before consulting the router.
    pub enabled: bool,

    /// Directory holding public assets.
    pub root: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: "public".to_string(),
        }
    }
}

/// A parameter binding used to warm one dynamic route.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PreloadSample {
    /// Route as registered, e.g. "/users/:id".
    pub route: String,

    /// Values for the route's parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Startup warm-up configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Run the warm-up before accepting traffic.
    pub enabled: bool,

    /// Also warm every route without parameters.
    pub static_routes: bool,

    /// Sampled bindings for dynamic routes.
    pub samples: Vec<PreloadSample>,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            static_routes: true,
            samples: Vec::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Gzip text responses for clients that accept it.
    pub compression: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
            compression: true,
        }
    }
}
