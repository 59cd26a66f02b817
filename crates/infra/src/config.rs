//! Environment-driven engine configuration.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::order_placement::PlacementPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub lock_timeout: Duration,
    pub placement_max_attempts: u32,
    pub placement_backoff: Duration,
    pub bind_addr: SocketAddr,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            lock_timeout: Duration::from_millis(2_000),
            placement_max_attempts: 3,
            placement_backoff: Duration::from_millis(25),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let database_max_connections = parse(&lookup, "DATABASE_MAX_CONNECTIONS")?
            .unwrap_or(defaults.database_max_connections);
        if database_max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "0", "must be at least 1"));
        }

        let lock_timeout = parse::<u64, _>(&lookup, "STORE_LOCK_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.lock_timeout);
        if lock_timeout.is_zero() {
            return Err(invalid("STORE_LOCK_TIMEOUT_MS", "0", "must be positive"));
        }

        let placement_max_attempts = parse(&lookup, "ORDER_PLACEMENT_MAX_ATTEMPTS")?
            .unwrap_or(defaults.placement_max_attempts);
        if placement_max_attempts == 0 {
            return Err(invalid("ORDER_PLACEMENT_MAX_ATTEMPTS", "0", "must be at least 1"));
        }

        let placement_backoff = parse::<u64, _>(&lookup, "ORDER_PLACEMENT_RETRY_BACKOFF_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.placement_backoff);

        let bind_addr = parse(&lookup, "BIND_ADDR")?.unwrap_or(defaults.bind_addr);

        Ok(Self {
            database_url,
            database_max_connections,
            lock_timeout,
            placement_max_attempts,
            placement_backoff,
            bind_addr,
        })
    }

    pub fn placement_policy(&self) -> PlacementPolicy {
        PlacementPolicy {
            max_attempts: self.placement_max_attempts,
            backoff: self.placement_backoff,
        }
    }
}

fn parse<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(name, &raw, &e.to_string())),
    }
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
