//! Mutable dispatcher state: task store, worker registry, endpoint queues.
//!
//! Owned by [`Dispatcher`](crate::Dispatcher) behind a single `RwLock`, so
//! every mutation here already runs serialized. Queues hold task ids only;
//! the task store is the sole owner of task records and the registry the
//! sole owner of worker records.

use std::collections::{HashMap, VecDeque};

use conveyor_core::types::{TaskId, WorkerId};
use conveyor_core::{Task, TaskStatus, Worker};

#[derive(Default)]
pub(crate) struct DispatchState {
    pub tasks: HashMap<TaskId, Task>,
    pub workers: HashMap<WorkerId, Worker>,
    queues: HashMap<String, VecDeque<TaskId>>,
}

impl DispatchState {
    /// Append a task id to the back of its endpoint queue (fresh submission).
    pub fn enqueue(&mut self, endpoint: &str, task_id: TaskId) {
        self.queues.entry(endpoint.to_string()).or_default().push_back(task_id);
    }

    /// Place a requeued task ahead of never-assigned tasks to bound the
    /// extra latency it already paid.
    pub fn enqueue_front(&mut self, endpoint: &str, task_id: TaskId) {
        self.queues.entry(endpoint.to_string()).or_default().push_front(task_id);
    }

    /// Pop the next id whose task is still `PENDING`.
    ///
    /// Ids whose task was cancelled (or otherwise moved on) between enqueue
    /// and pop are discarded here -- this is the race guard that lets
    /// cancellation leave queue entries in place.
    pub fn pop_next_pending(&mut self, endpoint: &str) -> Option<TaskId> {
        let queue = self.queues.get_mut(endpoint)?;
        while let Some(task_id) = queue.pop_front() {
            match self.tasks.get(&task_id) {
                Some(task) if task.status == TaskStatus::Pending => return Some(task_id),
                _ => {
                    tracing::debug!(%task_id, endpoint, "Discarding stale queue entry");
                }
            }
        }
        None
    }

    /// Drop a task from a worker's in-progress set and fix its job count.
    /// No-op if the worker is gone (already evicted).
    pub fn release_slot(&mut self, worker_id: &str, task_id: &str) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            if worker.jobs_in_progress.remove(task_id) {
                worker.current_jobs = worker.jobs_in_progress.len() as u32;
            }
        }
    }

    pub fn queue_len(&self, endpoint: &str) -> usize {
        self.queues.get(endpoint).map_or(0, |q| q.len())
    }
}
