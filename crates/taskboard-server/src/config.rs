use std::env;
use std::path::PathBuf;

use anyhow::{Context, anyhow};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_POOL_SIZE: u32 = 8;

/// Server settings, read from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// `None` serves from the in-memory table.
    pub database_url: Option<String>,
    /// Allowed CORS origin; `None` allows any.
    pub client_url: Option<String>,
    pub pool_size: u32,
    pub log_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid PORT: {raw}"))?,
            None => DEFAULT_PORT,
        };

        let pool_size = match non_empty("TASKBOARD_POOL_SIZE") {
            Some(raw) => {
                let size = raw
                    .trim()
                    .parse::<u32>()
                    .with_context(|| format!("invalid TASKBOARD_POOL_SIZE: {raw}"))?;
                if size == 0 {
                    return Err(anyhow!("TASKBOARD_POOL_SIZE must be at least 1"));
                }
                size
            }
            None => DEFAULT_POOL_SIZE,
        };

        Ok(Self {
            port,
            database_url: non_empty("DATABASE_URL"),
            client_url: non_empty("CLIENT_URL"),
            pool_size,
            log_dir: non_empty("TASKBOARD_LOG_DIR").map(PathBuf::from),
        })
    }
}
