//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Sector names that identify the production pool when none are configured.
pub const DEFAULT_PRODUCTION_SECTORS: &[&str] = &["produção", "production"];

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Candidate names of the production sector, matched case-insensitively.
    pub production_sectors: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            production_sectors: std::env::var("PRODUCTION_SECTORS")
                .ok()
                .map(|raw| parse_sector_list(&raw))
                .filter(|names| !names.is_empty())
                .unwrap_or_else(default_production_sectors),
        })
    }
}

pub fn default_production_sectors() -> Vec<String> {
    DEFAULT_PRODUCTION_SECTORS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Split a comma separated list, dropping blanks.
pub fn parse_sector_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}
