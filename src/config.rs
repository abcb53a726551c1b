//! Process configuration from environment variables
//!
//! Missing required variables and unparseable values are fatal at startup,
//! before any task is spawned.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVariable(&'static str),

    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Runtime configuration for the analytics consumer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Kafka bootstrap address list.
    pub bootstrap_servers: String,
    /// Topic carrying order-placed events.
    pub order_topic: String,
    /// Topic carrying inventory-result events.
    pub inventory_topic: String,
    /// Consumer group id.
    pub group_id: String,
    /// Offset reset policy when the group has no committed offset.
    pub auto_offset_reset: String,
    /// Sliding window length in seconds (also the dedup TTL).
    pub window_sec: u64,
    /// Fixed delay after each committed message, for load shaping.
    pub throttle_ms: u64,
    /// Query endpoint bind host.
    pub http_host: String,
    /// Query endpoint bind port.
    pub http_port: u16,
    /// Console report cadence in seconds; 0 disables the reporter.
    pub report_interval_sec: u64,
    /// Static consumer group member id, if configured.
    pub group_instance_id: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            match lookup(var) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(ConfigError::MissingVariable(var)),
            }
        };

        let group_instance_id = lookup("GROUP_INSTANCE_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        Ok(Self {
            bootstrap_servers: required("BOOTSTRAP_SERVERS")?,
            order_topic: required("ORDER_TOPIC")?,
            inventory_topic: required("INVENTORY_TOPIC")?,
            group_id: required("GROUP_ID")?,
            auto_offset_reset: lookup("AUTO_OFFSET_RESET")
                .unwrap_or_else(|| "earliest".to_string()),
            window_sec: parse_or(&lookup, "WINDOW_SEC", 60)?,
            throttle_ms: parse_or(&lookup, "THROTTLE_MS", 0)?,
            http_host: lookup("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port: parse_or(&lookup, "HTTP_PORT", 8080)?,
            report_interval_sec: parse_or(&lookup, "REPORT_INTERVAL_SEC", 0)?,
            group_instance_id,
        })
    }

    /// Load configuration from a map, for tests and tooling.
    pub fn from_map(vars: &HashMap<&str, &str>) -> Result<Self, ConfigError> {
        Self::from_lookup(|var| vars.get(var).map(|v| v.to_string()))
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
            var,
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}
