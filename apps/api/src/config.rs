use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Where records are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local, lost on restart. For local runs without a database.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    /// Required for the Postgres backend.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub autosave_quiet_period: Duration,
    /// Editing sessions untouched for this long are dropped.
    pub autosave_session_idle: Duration,
    pub skills_cache_ttl: Duration,
    /// Failure notifications kept per user.
    pub notification_history: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend: StoreBackend = optional_env("STORE_BACKEND", "postgres").parse()?;
        let database_url = match store_backend {
            StoreBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StoreBackend::Memory => std::env::var("DATABASE_URL").ok(),
        };

        Ok(Config {
            store_backend,
            database_url,
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
            autosave_quiet_period: Duration::from_millis(
                optional_env("AUTOSAVE_QUIET_PERIOD_MS", "2000")
                    .parse()
                    .context("AUTOSAVE_QUIET_PERIOD_MS must be a number of milliseconds")?,
            ),
            autosave_session_idle: Duration::from_secs(
                optional_env("AUTOSAVE_SESSION_IDLE_SECS", "1800")
                    .parse()
                    .context("AUTOSAVE_SESSION_IDLE_SECS must be a number of seconds")?,
            ),
            skills_cache_ttl: Duration::from_secs(
                optional_env("SKILLS_CACHE_TTL_SECS", "300")
                    .parse()
                    .context("SKILLS_CACHE_TTL_SECS must be a number of seconds")?,
            ),
            notification_history: optional_env("NOTIFICATION_HISTORY", "50")
                .parse()
                .context("NOTIFICATION_HISTORY must be a positive number")?,
        })
    }

    /// Memory-backed configuration with default timings.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            store_backend: StoreBackend::Memory,
            database_url: None,
            port: 0,
            rust_log: "debug".to_string(),
            autosave_quiet_period: Duration::from_millis(2000),
            autosave_session_idle: Duration::from_secs(1800),
            skills_cache_ttl: Duration::from_secs(300),
            notification_history: 50,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_eq!(" Memory ".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
