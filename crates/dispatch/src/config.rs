use std::time::Duration;

/// Tuning knobs for the dispatcher core.
///
/// Defaults suit local development; the API server overrides them from
/// environment variables.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// A worker whose last heartbeat is older than this is evicted and its
    /// in-flight tasks requeued.
    pub heartbeat_timeout: Duration,
    /// How often the background sweeper checks for stale workers.
    pub sweep_interval: Duration,
    /// How many requeues a task survives before it is failed with a
    /// synthetic "worker unavailable" error.
    pub max_retries: u32,
    /// Default budget for synchronous submissions.
    pub default_sync_wait: Duration,
    /// Concurrency assumed for a worker that never declared one.
    pub default_concurrency: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(10),
            max_retries: 3,
            default_sync_wait: Duration::from_secs(30),
            default_concurrency: 1,
        }
    }
}
