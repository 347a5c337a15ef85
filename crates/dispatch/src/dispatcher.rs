//! The dispatcher: assignment engine and completion/cancellation
//! coordinator.
//!
//! All mutating operations take the single write lock, so pop-and-claim,
//! cancellation, result application, and eviction are mutually
//! linearizable -- a task can only change hands inside [`Dispatcher::take_next`].
//! Reads (status queries, listings, stats) take the read lock and copy a
//! snapshot.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use conveyor_core::types::{TaskId, Timestamp, WorkerId};
use conveyor_core::{DispatchError, EndpointStats, Task, TaskStatus, Worker};
use conveyor_events::{TaskEvent, TaskEventBus};

use crate::config::DispatchConfig;
use crate::state::DispatchState;

/// Endpoint used when a submitter or worker does not name one.
pub const DEFAULT_ENDPOINT: &str = "default";

/// Synthetic error recorded when a task exhausts its requeue budget.
const RETRY_EXHAUSTED_ERROR: &str = "worker unavailable: retry limit exceeded";

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// A worker's final verdict on a task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Success(serde_json::Value),
    Failure(String),
}

/// Result of a synchronous submission: the latest task snapshot, plus
/// whether the wait budget ran out before the task finished.
///
/// A timed-out wait is not a task failure -- the task keeps running and the
/// snapshot simply carries a non-terminal status.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub task: Task,
    pub timed_out: bool,
}

/// Filters for [`Dispatcher::list_tasks`]. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub endpoint: Option<String>,
    /// Exact-match task id.
    pub task_id: Option<String>,
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.endpoint.as_deref().map_or(true, |e| task.endpoint == e)
            && self.task_id.as_deref().map_or(true, |id| task.id == id)
    }
}

/// One page of a filtered task listing.
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    /// Matching tasks before pagination.
    pub total: u64,
}

/// What one eviction sweep did.
#[derive(Debug, Default)]
pub struct EvictionReport {
    pub evicted_workers: Vec<WorkerId>,
    pub requeued_tasks: Vec<TaskId>,
    pub failed_tasks: Vec<TaskId>,
}

impl EvictionReport {
    pub fn is_empty(&self) -> bool {
        self.evicted_workers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Single logical authority over tasks, workers, and queues.
///
/// Cheap to share via `Arc`; every handler and the background sweeper hold
/// a clone.
pub struct Dispatcher {
    config: DispatchConfig,
    events: Arc<TaskEventBus>,
    state: RwLock<DispatchState>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            events: Arc::new(TaskEventBus::default()),
            state: RwLock::new(DispatchState::default()),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The bus carrying per-task chunk and terminal events.
    pub fn events(&self) -> Arc<TaskEventBus> {
        Arc::clone(&self.events)
    }

    fn normalize_endpoint(endpoint: &str) -> &str {
        if endpoint.is_empty() {
            DEFAULT_ENDPOINT
        } else {
            endpoint
        }
    }

    // -- Submission ---------------------------------------------------------

    /// Create a `PENDING` task and enqueue it for its endpoint.
    pub async fn submit(&self, endpoint: &str, input: serde_json::Value) -> Task {
        let endpoint = Self::normalize_endpoint(endpoint);
        let task = Task::new(endpoint, input);

        let mut state = self.state.write().await;
        state.enqueue(endpoint, task.id.clone());
        state.tasks.insert(task.id.clone(), task.clone());
        drop(state);

        tracing::info!(task_id = %task.id, endpoint, "Task submitted");
        task
    }

    /// Submit and block until the task reaches a terminal state or `budget`
    /// elapses. The caller always gets a snapshot back.
    pub async fn run_sync(
        &self,
        endpoint: &str,
        input: serde_json::Value,
        budget: std::time::Duration,
    ) -> SyncOutcome {
        // Subscribe before submitting so the terminal event cannot slip
        // between enqueue and the first recv.
        let mut rx = self.events.subscribe();
        let task = self.submit(endpoint, input).await;
        let task_id = task.id.clone();

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(event) if event.task_id == task_id && event.is_final() => return,
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(%task_id, skipped, "Sync waiter lagged, checking store");
                        if let Ok(task) = self.get(&task_id).await {
                            if task.is_terminal() {
                                return;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        };

        let timed_out = tokio::time::timeout(budget, wait).await.is_err();

        // Snapshot after the wait; the task cannot vanish from the store.
        let task = self.get(&task_id).await.unwrap_or(task);
        SyncOutcome {
            timed_out: timed_out && !task.is_terminal(),
            task,
        }
    }

    // -- Queries ------------------------------------------------------------

    pub async fn get(&self, task_id: &str) -> Result<Task, DispatchError> {
        let state = self.state.read().await;
        state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| DispatchError::NotFound {
                entity: "Task",
                id: task_id.to_string(),
            })
    }

    /// Filtered task listing, newest first, with offset/limit pagination.
    ///
    /// `total` counts every match so clients can page past `limit`.
    pub async fn list_tasks(&self, filter: &TaskFilter, limit: usize, offset: usize) -> TaskPage {
        let state = self.state.read().await;
        let mut matches: Vec<&Task> = state
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matches.len() as u64;
        let tasks = matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        TaskPage { tasks, total }
    }

    /// Online workers, optionally restricted to one endpoint.
    pub async fn list_workers(&self, endpoint: Option<&str>) -> Vec<Worker> {
        let now = Utc::now();
        let state = self.state.read().await;
        let mut workers: Vec<Worker> = state
            .workers
            .values()
            .filter(|w| w.is_online(now, self.config.heartbeat_timeout))
            .filter(|w| endpoint.map_or(true, |e| w.endpoint == e))
            .cloned()
            .collect();
        workers.sort_by(|a, b| a.id.cmp(&b.id));
        workers
    }

    /// Statistics for one endpoint, computed from the store and registry.
    pub async fn endpoint_stats(&self, endpoint: &str) -> EndpointStats {
        let endpoint = Self::normalize_endpoint(endpoint);
        let now = Utc::now();
        let state = self.state.read().await;

        let mut stats = EndpointStats {
            endpoint: endpoint.to_string(),
            ..EndpointStats::default()
        };
        for task in state.tasks.values().filter(|t| t.endpoint == endpoint) {
            match task.status {
                TaskStatus::Pending => stats.pending_tasks += 1,
                TaskStatus::InProgress => stats.in_progress_tasks += 1,
                TaskStatus::Completed => stats.completed_tasks += 1,
                TaskStatus::Failed => stats.failed_tasks += 1,
                TaskStatus::Cancelled => {}
            }
        }
        stats.online_workers = state
            .workers
            .values()
            .filter(|w| w.endpoint == endpoint && w.is_online(now, self.config.heartbeat_timeout))
            .count() as u64;
        stats
    }

    // -- Worker protocol ----------------------------------------------------

    /// Upsert a worker and refresh its heartbeat. A declared concurrency
    /// takes effect on the worker's next pull.
    pub async fn heartbeat(
        &self,
        worker_id: &str,
        endpoint: &str,
        concurrency: Option<u32>,
    ) -> Worker {
        let endpoint = Self::normalize_endpoint(endpoint);
        let mut state = self.state.write().await;
        let worker = self.upsert_worker(&mut state, worker_id, endpoint, concurrency);
        tracing::debug!(
            worker_id,
            endpoint,
            concurrency = worker.concurrency,
            current_jobs = worker.current_jobs,
            "Heartbeat received",
        );
        worker
    }

    fn upsert_worker(
        &self,
        state: &mut DispatchState,
        worker_id: &str,
        endpoint: &str,
        concurrency: Option<u32>,
    ) -> Worker {
        let worker = state
            .workers
            .entry(worker_id.to_string())
            .or_insert_with(|| {
                tracing::info!(worker_id, endpoint, "Worker registered");
                Worker::new(
                    worker_id,
                    endpoint,
                    concurrency.unwrap_or(self.config.default_concurrency),
                )
            });
        worker.last_heartbeat = Utc::now();
        worker.endpoint = endpoint.to_string();
        if let Some(concurrency) = concurrency {
            worker.concurrency = concurrency;
        }
        worker.clone()
    }

    /// Claim the next eligible task for `worker_id`, or `None` when the
    /// worker is at capacity or the queue has nothing pending.
    ///
    /// This is the single atomic claim unit: verify capacity, pop past any
    /// stale queue entries, transition the task, and charge the worker's
    /// slot -- all under one write-lock acquisition. A pull also counts as a
    /// liveness signal.
    pub async fn take_next(&self, endpoint: &str, worker_id: &str) -> Option<Task> {
        let endpoint = Self::normalize_endpoint(endpoint);
        let mut state = self.state.write().await;

        // Concurrency is re-read here, so dynamic adjustments apply to this
        // very pull.
        let worker = self.upsert_worker(&mut state, worker_id, endpoint, None);
        if worker.available_slots() == 0 {
            return None;
        }

        let task_id = state.pop_next_pending(endpoint)?;
        let now = Utc::now();

        // Popped under this same lock, so the record is guaranteed present.
        let task = state.tasks.get_mut(&task_id)?;
        task.status = TaskStatus::InProgress;
        task.assigned_worker = Some(worker_id.to_string());
        task.started_at = Some(now);
        let snapshot = task.clone();

        if let Some(worker) = state.workers.get_mut(worker_id) {
            worker.jobs_in_progress.insert(task_id.clone());
            worker.current_jobs = worker.jobs_in_progress.len() as u32;
        }
        drop(state);

        tracing::info!(
            task_id = %snapshot.id,
            worker_id,
            endpoint,
            retries = snapshot.retries,
            "Task claimed",
        );
        Some(snapshot)
    }

    /// Apply a worker's final result.
    ///
    /// Rejected with `Conflict` when the task is already terminal or not
    /// held by `worker_id`; callers log and discard such reports (worker
    /// retries are harmless).
    pub async fn report_result(
        &self,
        task_id: &str,
        worker_id: &str,
        outcome: TaskOutcome,
    ) -> Result<Task, DispatchError> {
        let mut state = self.state.write().await;

        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DispatchError::NotFound {
                entity: "Task",
                id: task_id.to_string(),
            })?;
        Self::verify_held(task, worker_id)?;

        let now = Utc::now();
        match outcome {
            TaskOutcome::Success(output) => {
                task.status = TaskStatus::Completed;
                task.output = Some(output);
            }
            TaskOutcome::Failure(error) => {
                task.status = TaskStatus::Failed;
                task.error = Some(error);
            }
        }
        task.completed_at = Some(now);
        task.assigned_worker = None;
        let snapshot = task.clone();

        state.release_slot(worker_id, task_id);
        self.events
            .publish(TaskEvent::finished(task_id, snapshot.status));
        drop(state);

        tracing::info!(
            task_id,
            worker_id,
            status = %snapshot.status,
            execution_ms = snapshot.execution_ms(),
            "Task result applied",
        );
        Ok(snapshot)
    }

    /// Publish one partial-output chunk for an in-flight task.
    pub async fn report_chunk(
        &self,
        task_id: &str,
        worker_id: &str,
        output: serde_json::Value,
    ) -> Result<(), DispatchError> {
        // The write lock serializes concurrent chunk reports, so publish
        // order matches the order the reports were applied in.
        let state = self.state.write().await;
        let task = state
            .tasks
            .get(task_id)
            .ok_or_else(|| DispatchError::NotFound {
                entity: "Task",
                id: task_id.to_string(),
            })?;
        Self::verify_held(task, worker_id)?;

        self.events.publish(TaskEvent::chunk(task_id, output));
        Ok(())
    }

    fn verify_held(task: &Task, worker_id: &str) -> Result<(), DispatchError> {
        if task.is_terminal() {
            return Err(DispatchError::Conflict(format!(
                "task {} is already {}",
                task.id, task.status
            )));
        }
        if task.status != TaskStatus::InProgress
            || task.assigned_worker.as_deref() != Some(worker_id)
        {
            return Err(DispatchError::Conflict(format!(
                "task {} is not held by worker {worker_id}",
                task.id
            )));
        }
        Ok(())
    }

    // -- Cancellation -------------------------------------------------------

    /// Cancel a task. Idempotent: a terminal task is returned unchanged.
    ///
    /// A pending task is cancelled in place; its queue entry is discarded
    /// lazily by `take_next`. An in-progress task flips to `CANCELLED`
    /// immediately for submitters while the holding worker runs on
    /// unimpeded -- its eventual report is discarded as a conflict.
    pub async fn cancel(&self, task_id: &str) -> Result<Task, DispatchError> {
        let mut state = self.state.write().await;

        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DispatchError::NotFound {
                entity: "Task",
                id: task_id.to_string(),
            })?;

        if task.is_terminal() {
            return Ok(task.clone());
        }

        let previous = task.status;
        let holder = task.assigned_worker.take();
        task.status = TaskStatus::Cancelled;
        task.completed_at = Some(Utc::now());
        let snapshot = task.clone();

        if let Some(worker_id) = &holder {
            state.release_slot(worker_id, task_id);
        }
        self.events
            .publish(TaskEvent::finished(task_id, TaskStatus::Cancelled));
        drop(state);

        tracing::info!(
            task_id,
            previous_status = %previous,
            worker_id = holder.as_deref().unwrap_or(""),
            "Task cancelled",
        );
        Ok(snapshot)
    }

    // -- Eviction -----------------------------------------------------------

    /// Evict workers whose heartbeat is older than the timeout as of `now`
    /// and requeue their in-flight tasks at the front of their queues.
    ///
    /// Runs under the same write lock as assignment, so a task cannot be
    /// claimed and evicted concurrently.
    pub async fn evict_stale(&self, now: Timestamp) -> EvictionReport {
        let mut state = self.state.write().await;
        let mut report = EvictionReport::default();

        let stale: Vec<WorkerId> = state
            .workers
            .values()
            .filter(|w| !w.is_online(now, self.config.heartbeat_timeout))
            .map(|w| w.id.clone())
            .collect();

        for worker_id in stale {
            let Some(worker) = state.workers.remove(&worker_id) else {
                continue;
            };
            tracing::warn!(
                worker_id = %worker.id,
                endpoint = %worker.endpoint,
                held_tasks = worker.jobs_in_progress.len(),
                "Worker evicted after heartbeat timeout",
            );

            for task_id in worker.jobs_in_progress {
                let Some(task) = state.tasks.get_mut(&task_id) else {
                    continue;
                };
                // Only reclaim tasks this worker still holds; a racing
                // cancel or report may already have moved the task on.
                if task.status != TaskStatus::InProgress
                    || task.assigned_worker.as_deref() != Some(worker.id.as_str())
                {
                    continue;
                }

                task.assigned_worker = None;
                task.retries += 1;

                if task.retries > self.config.max_retries {
                    task.status = TaskStatus::Failed;
                    task.error = Some(RETRY_EXHAUSTED_ERROR.to_string());
                    task.completed_at = Some(now);
                    tracing::warn!(
                        %task_id,
                        retries = task.retries,
                        "Task failed after exhausting requeue budget",
                    );
                    self.events
                        .publish(TaskEvent::finished(&task_id, TaskStatus::Failed));
                    report.failed_tasks.push(task_id);
                } else {
                    task.status = TaskStatus::Pending;
                    task.started_at = None;
                    let endpoint = task.endpoint.clone();
                    tracing::info!(%task_id, endpoint = %endpoint, retries = task.retries, "Task requeued");
                    state.enqueue_front(&endpoint, task_id.clone());
                    report.requeued_tasks.push(task_id);
                }
            }
            report.evicted_workers.push(worker.id);
        }

        report
    }

    #[cfg(test)]
    pub(crate) async fn queue_len(&self, endpoint: &str) -> usize {
        self.state.read().await.queue_len(endpoint)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
