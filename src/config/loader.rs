//! Configuration loading from disk and environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::RuntimeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => {
                write!(f, "Invalid {} in environment: '{}'", var, value)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_config(&content)?;
    finish(config, std::env::var("PORT").ok())
}

/// Defaults plus environment overrides, for running without a file.
pub fn default_config() -> Result<RuntimeConfig, ConfigError> {
    finish(RuntimeConfig::default(), std::env::var("PORT").ok())
}

/// Parse TOML text without validating it.
pub fn parse_config(content: &str) -> Result<RuntimeConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

fn finish(mut config: RuntimeConfig, port: Option<String>) -> Result<RuntimeConfig, ConfigError> {
    if let Some(port) = port {
        apply_port(&mut config, &port)?;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Replace the listener port, keeping the configured host.
fn apply_port(config: &mut RuntimeConfig, port: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Env {
        var: "PORT",
        value: port.to_string(),
    };
    let port: u16 = port.trim().parse().map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }

    let mut addr: SocketAddr = config
        .listener
        .bind_address
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));
    addr.set_port(port);
    config.listener.bind_address = addr.to_string();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DataTimeoutPolicy;

    #[test]
    fn test_parse_partial_config_uses_defaults() {
        let config = parse_config(
            r#"
            [cache]
            capacity = 10
            ttl_secs = 5

            [render]
            on_data_timeout = "fail"

            [[preload.samples]]
            route = "/users/:id"
            params = { id = "1" }
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.capacity, 10);
        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.cache.max_payload_bytes, 128 * 1024);
        assert_eq!(config.render.on_data_timeout, DataTimeoutPolicy::Fail);
        assert_eq!(config.preload.samples[0].params["id"], "1");
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
    }

    #[test]
    fn test_port_override() {
        let config = finish(RuntimeConfig::default(), Some("8088".into())).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8088");
    }

    #[test]
    fn test_port_override_rejects_out_of_range() {
        for bad in ["0", "70000", "http"] {
            let err = finish(RuntimeConfig::default(), Some(bad.into())).unwrap_err();
            assert!(matches!(err, ConfigError::Env { var: "PORT", .. }), "{}", bad);
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = RuntimeConfig::default();
        config.cache.capacity = 0;
        let err = finish(config, None).unwrap_err();
        assert!(err.to_string().contains("cache.capacity"));
    }
}
