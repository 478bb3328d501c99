//! Application settings loaded from config.toml
//!
//! Every section is optional in the file and falls back to defaults. The
//! `DATABASE_URL` and `BIND_ADDR` environment variables (typically from `.env`)
//! take precedence over the file.

use super::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Store settings
    pub database: DatabaseConfig,
    /// Daily capacity settings
    pub capacity: CapacityConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SeaORM` connection URL
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// Daily capacity settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Maximum confirmed pax per calendar date, across all forms and packages
    pub max_pax_per_date: u32,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            max_pax_per_date: 3,
        }
    }
}

impl CapacityConfig {
    /// Ceiling as the signed width used for pax arithmetic.
    #[must_use]
    pub fn ceiling(self) -> i64 {
        i64::from(self.max_pax_per_date)
    }
}

/// Parses configuration from a TOML string.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    validate(&config)?;
    Ok(config)
}

/// Loads configuration from a TOML file.
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - The capacity ceiling is zero
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Loads `config.toml` (or the file named by `CONFIG_PATH`) and applies
/// environment overrides. A missing file is not an error; defaults are used.
pub fn load_app_config() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

    let mut config = if Path::new(&path).exists() {
        load_config(&path)?
    } else {
        info!(path = %path, "No config file found, using defaults");
        AppConfig::default()
    };

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(addr) = std::env::var("BIND_ADDR") {
        config.server.bind_addr = addr;
    }

    info!(
        bind_addr = %config.server.bind_addr,
        max_pax_per_date = config.capacity.max_pax_per_date,
        "Configuration loaded"
    );
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.capacity.max_pax_per_date == 0 {
        return Err(Error::Config {
            message: "capacity.max_pax_per_date must be at least 1".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [server]
            bind_addr = "0.0.0.0:9000"

            [database]
            url = "sqlite::memory:"

            [capacity]
            max_pax_per_date = 12
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.capacity.max_pax_per_date, 12);
        assert_eq!(config.capacity.ceiling(), 12);
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.capacity, CapacityConfig::default());
        assert_eq!(config.capacity.max_pax_per_date, 3);
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn test_zero_ceiling_is_rejected() {
        let result = parse_config("[capacity]\nmax_pax_per_date = 0\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_config("[capacity\nmax_pax_per_date = 3");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
