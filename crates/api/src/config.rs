use std::time::Duration;

use conveyor_dispatch::DispatchConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `90`). Must exceed the
    /// synchronous wait cap or `runsync` calls get cut off mid-wait.
    pub request_timeout_secs: u64,
    /// Seconds without a heartbeat before a worker is evicted (default: `30`).
    pub heartbeat_timeout_secs: u64,
    /// Seconds between eviction sweeps (default: `10`).
    pub sweep_interval_secs: u64,
    /// Requeue budget per task before it fails (default: `3`).
    pub max_task_retries: u32,
    /// Default wait budget for synchronous submissions (default: `30`).
    pub sync_wait_timeout_secs: u64,
    /// Upper bound on a client-requested `wait` (default: `60`).
    pub max_sync_wait_secs: u64,
    /// Concurrency assumed for workers that never declare one (default: `1`).
    pub default_worker_concurrency: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `HOST`                       | `0.0.0.0`               |
    /// | `PORT`                       | `3000`                  |
    /// | `CORS_ORIGINS`               | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`       | `90`                    |
    /// | `HEARTBEAT_TIMEOUT_SECS`     | `30`                    |
    /// | `SWEEP_INTERVAL_SECS`        | `10`                    |
    /// | `MAX_TASK_RETRIES`           | `3`                     |
    /// | `SYNC_WAIT_TIMEOUT_SECS`     | `30`                    |
    /// | `MAX_SYNC_WAIT_SECS`         | `60`                    |
    /// | `DEFAULT_WORKER_CONCURRENCY` | `1`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port: env_parse("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 90),
            heartbeat_timeout_secs: env_parse("HEARTBEAT_TIMEOUT_SECS", 30),
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS", 10),
            max_task_retries: env_parse("MAX_TASK_RETRIES", 3),
            sync_wait_timeout_secs: env_parse("SYNC_WAIT_TIMEOUT_SECS", 30),
            max_sync_wait_secs: env_parse("MAX_SYNC_WAIT_SECS", 60),
            default_worker_concurrency: env_parse("DEFAULT_WORKER_CONCURRENCY", 1),
        }
    }

    /// Dispatcher tuning derived from the server-level knobs.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            heartbeat_timeout: Duration::from_secs(self.heartbeat_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            max_retries: self.max_task_retries,
            default_sync_wait: Duration::from_secs(self.sync_wait_timeout_secs),
            default_concurrency: self.default_worker_concurrency,
        }
    }
}

/// Parse an env var, panicking at startup on malformed values -- we want
/// misconfiguration to fail fast.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
