//! Configuration management for identity-permissions

use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Claims resolution behaviour
    pub claims: ClaimsConfig,
    /// Logging output
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimsConfig {
    /// Resolve tenant role permissions and emit tenant claims
    pub tenant_aware: bool,
    /// Drop repeated permission claims, keeping first-seen order
    pub deduplicate_permission_claims: bool,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            tenant_aware: true,
            deduplicate_permission_claims: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "text" or "json"
    pub log_format: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn is_json(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: lookup("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },
            claims: ClaimsConfig {
                tenant_aware: parse_bool(
                    lookup("PERMISSIONS_TENANT_AWARE"),
                    true,
                    "PERMISSIONS_TENANT_AWARE",
                )?,
                deduplicate_permission_claims: parse_bool(
                    lookup("PERMISSIONS_DEDUPLICATE_CLAIMS"),
                    false,
                    "PERMISSIONS_DEDUPLICATE_CLAIMS",
                )?,
            },
            telemetry: TelemetryConfig {
                log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "text".to_string()),
            },
        })
    }
}

fn parse_bool(value: Option<String>, default: bool, name: &str) -> Result<bool> {
    match value {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow::anyhow!("'{}' is not a boolean", raw))
                .with_context(|| format!("Invalid {}", name)),
        },
    }
}
