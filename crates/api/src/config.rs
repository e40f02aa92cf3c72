use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// Which implementation backs the account, ledger and job stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local stores. State is lost on restart.
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the JWT
/// secret and, for the PostgreSQL backend, the database URL.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for background services to drain on shutdown.
    pub shutdown_timeout_secs: u64,
    /// How long a generator request waits for its job before answering 202.
    /// Must be below `request_timeout_secs`.
    pub generation_wait_secs: u64,
    pub store_backend: StoreBackend,
    /// Required when `store_backend` is `Postgres`.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:3000`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `GENERATION_WAIT_SECS`  | `20`                       |
    /// | `STORE_BACKEND`         | `postgres`                 |
    /// | `DATABASE_URL`          | required for `postgres`    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let generation_wait_secs: u64 = std::env::var("GENERATION_WAIT_SECS")
            .unwrap_or_else(|_| "20".into())
            .parse()
            .expect("GENERATION_WAIT_SECS must be a valid u64");

        assert_wait_below_timeout(generation_wait_secs, request_timeout_secs);

        let store_backend: StoreBackend = std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .parse()
            .expect("STORE_BACKEND must be 'memory' or 'postgres'");

        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            panic!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            generation_wait_secs,
            store_backend,
            database_url,
            jwt,
        }
    }
}

/// A generator call must answer 202 before the request timeout answers 408.
fn assert_wait_below_timeout(generation_wait_secs: u64, request_timeout_secs: u64) {
    assert!(
        generation_wait_secs < request_timeout_secs,
        "GENERATION_WAIT_SECS ({generation_wait_secs}) must be below REQUEST_TIMEOUT_SECS ({request_timeout_secs})"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_wait_below_timeout_is_accepted() {
        assert_wait_below_timeout(20, 30);
        assert_wait_below_timeout(0, 1);
    }

    #[test]
    #[should_panic(expected = "GENERATION_WAIT_SECS (30) must be below REQUEST_TIMEOUT_SECS (30)")]
    fn generation_wait_at_timeout_is_rejected() {
        assert_wait_below_timeout(30, 30);
    }

    #[test]
    fn store_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!(" postgres ".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
