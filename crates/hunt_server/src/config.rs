//! Server configuration from environment variables.
//!
//!   HUNT_DATABASE_URL        Postgres connection string (required)
//!   HUNT_JWT_SECRET          JWT HMAC secret (required)
//!   HUNT_BIND_ADDR           listen address (default: 0.0.0.0:4200)
//!   HUNT_DB_MAX_CONNECTIONS  pool size (default: 10)
//!   HUNT_RUN_MIGRATIONS      apply the schema on startup (default: true)

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = get("HUNT_DATABASE_URL").context("HUNT_DATABASE_URL must be set")?;
        let jwt_secret = get("HUNT_JWT_SECRET").context("HUNT_JWT_SECRET must be set")?;
        let bind_addr = get("HUNT_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:4200".into());
        let max_connections = match get("HUNT_DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("HUNT_DB_MAX_CONNECTIONS is not a number: {v}"))?,
            None => 10,
        };
        let run_migrations = match get("HUNT_RUN_MIGRATIONS").as_deref() {
            None => true,
            Some("1" | "true" | "yes") => true,
            Some("0" | "false" | "no") => false,
            Some(other) => anyhow::bail!("HUNT_RUN_MIGRATIONS must be true or false, got {other}"),
        };
        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            max_connections,
            run_migrations,
        })
    }
}
