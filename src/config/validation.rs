//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, capacity > 0, ports valid)
//! - Check preload samples reference absolute routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RuntimeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::RuntimeConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &RuntimeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.server_data_ms == 0 {
        errors.push(ValidationError::new("timeouts.server_data_ms", "must be greater than 0"));
    }
    if config.timeouts.render_ms == 0 {
        errors.push(ValidationError::new("timeouts.render_ms", "must be greater than 0"));
    }

    if config.cache.capacity == 0 {
        errors.push(ValidationError::new("cache.capacity", "must be at least 1"));
    }
    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::new("cache.ttl_secs", "must be at least 1"));
    }
    if config.cache.max_payload_bytes < config.cache.min_payload_bytes {
        errors.push(ValidationError::new(
            "cache.max_payload_bytes",
            "must not be smaller than cache.min_payload_bytes",
        ));
    }

    if config.render.live_buffer_chunks == 0 {
        errors.push(ValidationError::new("render.live_buffer_chunks", "must be at least 1"));
    }

    for (i, sample) in config.preload.samples.iter().enumerate() {
        if !sample.route.starts_with('/') {
            errors.push(ValidationError::new(
                format!("preload.samples[{}].route", i),
                format!("'{}' must start with '/'", sample.route),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
