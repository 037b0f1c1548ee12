//! Process configuration, read from plain environment variables.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

use tradeflow_core::OrganizationId;

use crate::organizations::OrganizationSeed;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_COMMIT_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} is required")]
    Missing(&'static str),
}

/// Which ledger store backs the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    InMemory,
    Postgres {
        url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreConfig,
    /// Extra attempts after an optimistic-concurrency conflict.
    pub commit_retries: u32,
    /// Where transactional emails go; `None` only logs them.
    pub notification_recipient: Option<String>,
    pub organizations: Vec<OrganizationSeed>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            store: StoreConfig::InMemory,
            commit_retries: DEFAULT_COMMIT_RETRIES,
            notification_recipient: None,
            organizations: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let persistent = lookup("USE_PERSISTENT_STORES")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let store = if persistent {
            StoreConfig::Postgres {
                url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: parse_number(
                    &lookup,
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_MAX_CONNECTIONS,
                )?,
            }
        } else {
            StoreConfig::InMemory
        };

        let commit_retries = parse_number(&lookup, "COMMIT_RETRIES", DEFAULT_COMMIT_RETRIES)?;
        let notification_recipient = lookup("NOTIFICATION_RECIPIENT")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let organizations = match lookup("ORGANIZATIONS") {
            Some(raw) => parse_organizations(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            bind_addr,
            store,
            commit_retries,
            notification_recipient,
            organizations,
        })
    }
}

fn parse_number<F>(lookup: &F, name: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }
        }),
        None => Ok(default),
    }
}

/// Parse `key[=uuid],key[=uuid],...`.
fn parse_organizations(raw: &str) -> Result<Vec<OrganizationSeed>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, id)) => {
                let id: OrganizationId = id.trim().parse().map_err(|e: tradeflow_core::DomainError| {
                    ConfigError::Invalid {
                        name: "ORGANIZATIONS",
                        reason: e.to_string(),
                    }
                })?;
                Ok(OrganizationSeed {
                    key: key.trim().to_string(),
                    id: Some(id),
                })
            }
            None => Ok(OrganizationSeed {
                key: entry.to_string(),
                id: None,
            }),
        })
        .collect()
}
