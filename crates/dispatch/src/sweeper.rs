//! Periodic eviction of workers with stale heartbeats.
//!
//! Spawns a background loop that calls [`Dispatcher::evict_stale`] on a
//! fixed interval using `tokio::time::interval`. Runs until the
//! cancellation token is triggered.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;

/// Run the eviction sweep loop until `cancel` is triggered.
///
/// The interval comes from the dispatcher's own config, so one knob
/// controls both the sweep cadence and the heartbeat deadline it enforces.
pub async fn start_sweeper(dispatcher: Arc<Dispatcher>, cancel: CancellationToken) {
    let interval_dur = dispatcher.config().sweep_interval;
    tracing::info!(
        interval_secs = interval_dur.as_secs(),
        heartbeat_timeout_secs = dispatcher.config().heartbeat_timeout.as_secs(),
        "Eviction sweeper started"
    );

    let mut interval = tokio::time::interval(interval_dur);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Eviction sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                let report = dispatcher.evict_stale(Utc::now()).await;
                if report.is_empty() {
                    tracing::debug!("Eviction sweep: all workers healthy");
                } else {
                    tracing::info!(
                        evicted = report.evicted_workers.len(),
                        requeued = report.requeued_tasks.len(),
                        failed = report.failed_tasks.len(),
                        "Eviction sweep: removed stale workers"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn sweeper_stops_on_cancellation() {
        let mut config = DispatchConfig::default();
        config.sweep_interval = Duration::from_millis(10);
        let dispatcher = Arc::new(Dispatcher::new(config));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(start_sweeper(Arc::clone(&dispatcher), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper exits promptly after cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn sweeper_evicts_silent_worker() {
        let mut config = DispatchConfig::default();
        config.sweep_interval = Duration::from_millis(10);
        config.heartbeat_timeout = Duration::from_millis(20);
        let dispatcher = Arc::new(Dispatcher::new(config));

        dispatcher.heartbeat("w1", "e", Some(1)).await;
        assert_eq!(dispatcher.list_workers(None).await.len(), 1);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(start_sweeper(Arc::clone(&dispatcher), cancel.clone()));

        // Give the worker time to go stale and the sweeper time to notice.
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        let _ = handle.await;

        assert!(dispatcher.list_workers(None).await.is_empty());
    }
}
