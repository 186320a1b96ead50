use std::time::Duration;

use anyhow::{anyhow, bail};

/// Runtime configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// Postgres backend when set, in-memory store otherwise.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Upper bound for every store round-trip.
    pub store_timeout: Duration,
    pub run_migrations: bool,
    pub frontend_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("JWT_SECRET").ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;
        if jwt_secret.len() < 32 {
            bail!("JWT_SECRET must be at least 32 characters long");
        }
        let parsed = |name: &str, default: u64| -> anyhow::Result<u64> {
            match get(name) {
                Some(v) => v.trim().parse().map_err(|_| anyhow!("{name} must be a positive integer, got {v:?}")),
                None => Ok(default),
            }
        };
        let db_max_connections = u32::try_from(parsed("DB_MAX_CONNECTIONS", 5)?)?;
        let store_timeout = Duration::from_millis(parsed("STORE_TIMEOUT_MS", 5_000)?);
        if store_timeout.is_zero() {
            bail!("STORE_TIMEOUT_MS must be greater than zero");
        }
        let run_migrations = get("RUN_MIGRATIONS")
            .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
            .unwrap_or(true);
        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            jwt_secret,
            database_url: get("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            db_max_connections,
            store_timeout,
            run_migrations,
            frontend_url: get("FRONTEND_URL"),
        })
    }
}
