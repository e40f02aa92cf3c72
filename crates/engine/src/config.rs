use std::path::PathBuf;
use std::time::Duration;

use goldrush_core::backoff::RetryPolicy;

use crate::dispatcher::DEFAULT_QUEUE_CAPACITY;

/// Engine tuning loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of queued jobs (default: `1000`).
    pub queue_capacity: usize,
    /// Number of concurrent workers (default: `4`).
    pub worker_count: usize,
    /// Bound on a single provider call (default: 60 s).
    pub provider_timeout: Duration,
    /// Provider retry policy.
    pub retry: RetryPolicy,
    /// How long a reservation may stay held before the sweeper releases it
    /// (default: 15 min).
    pub reservation_ttl: Duration,
    /// Sweeper tick (default: 30 s).
    pub sweep_interval: Duration,
    /// Optional JSON plan catalogue replacing the built-in plans.
    pub plans_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_count: 4,
            provider_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            reservation_ttl: Duration::from_secs(900),
            sweep_interval: Duration::from_secs(30),
            plans_path: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default  |
    /// |--------------------------|----------|
    /// | `QUEUE_CAPACITY`         | `1000`   |
    /// | `WORKER_COUNT`           | `4`      |
    /// | `PROVIDER_TIMEOUT_SECS`  | `60`     |
    /// | `PROVIDER_MAX_ATTEMPTS`  | `3`      |
    /// | `RETRY_INITIAL_DELAY_MS` | `500`    |
    /// | `RETRY_MAX_DELAY_MS`     | `10000`  |
    /// | `RESERVATION_TTL_SECS`   | `900`    |
    /// | `SWEEP_INTERVAL_SECS`    | `30`     |
    /// | `PLANS_PATH`             | (unset)  |
    pub fn from_env() -> Self {
        let queue_capacity: usize = env_or("QUEUE_CAPACITY", "1000")
            .parse()
            .expect("QUEUE_CAPACITY must be a valid usize");

        let worker_count: usize = env_or("WORKER_COUNT", "4")
            .parse()
            .expect("WORKER_COUNT must be a valid usize");

        let provider_timeout_secs: u64 = env_or("PROVIDER_TIMEOUT_SECS", "60")
            .parse()
            .expect("PROVIDER_TIMEOUT_SECS must be a valid u64");

        let max_attempts: u32 = env_or("PROVIDER_MAX_ATTEMPTS", "3")
            .parse()
            .expect("PROVIDER_MAX_ATTEMPTS must be a valid u32");

        let initial_delay_ms: u64 = env_or("RETRY_INITIAL_DELAY_MS", "500")
            .parse()
            .expect("RETRY_INITIAL_DELAY_MS must be a valid u64");

        let max_delay_ms: u64 = env_or("RETRY_MAX_DELAY_MS", "10000")
            .parse()
            .expect("RETRY_MAX_DELAY_MS must be a valid u64");

        let reservation_ttl_secs: u64 = env_or("RESERVATION_TTL_SECS", "900")
            .parse()
            .expect("RESERVATION_TTL_SECS must be a valid u64");

        let sweep_interval_secs: u64 = env_or("SWEEP_INTERVAL_SECS", "30")
            .parse()
            .expect("SWEEP_INTERVAL_SECS must be a valid u64");

        let plans_path = std::env::var("PLANS_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        assert!(queue_capacity > 0, "QUEUE_CAPACITY must be at least 1");
        assert!(worker_count > 0, "WORKER_COUNT must be at least 1");
        assert!(max_attempts > 0, "PROVIDER_MAX_ATTEMPTS must be at least 1");

        let config = Self {
            queue_capacity,
            worker_count,
            provider_timeout: Duration::from_secs(provider_timeout_secs),
            retry: RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(initial_delay_ms),
                max_delay: Duration::from_millis(max_delay_ms),
                ..RetryPolicy::default()
            },
            reservation_ttl: Duration::from_secs(reservation_ttl_secs),
            sweep_interval: Duration::from_secs(sweep_interval_secs),
            plans_path,
        };
        assert!(
            config.reservation_ttl > config.max_run_time(),
            "RESERVATION_TTL_SECS must exceed the longest job run ({}s)",
            config.max_run_time().as_secs(),
        );
        config
    }

    /// Longest a claimed job can run: every attempt timing out, plus the
    /// backoff between attempts.
    pub fn max_run_time(&self) -> Duration {
        let attempts = self.retry.max_attempts.max(1);
        let backoff: Duration = (1..attempts).map(|a| self.retry.delay_after(a)).sum();
        self.provider_timeout * attempts + backoff
    }

    /// Reservation hold as a `chrono` duration for the ledger.
    pub fn reservation_hold(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.reservation_ttl).unwrap_or_else(|_| chrono::Duration::days(365))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}
