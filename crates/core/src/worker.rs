//! Worker record and endpoint-level statistics.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::types::{TaskId, Timestamp, WorkerId};

/// Worker liveness, derived from heartbeat recency at serialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Online,
    Offline,
}

/// A worker process serving one endpoint, bounded by declared concurrency.
///
/// The registry is the exclusive owner of these records. `current_jobs`
/// always equals `jobs_in_progress.len()`, and never exceeds `concurrency`.
#[derive(Debug, Clone, Serialize)]
pub struct Worker {
    pub id: WorkerId,
    pub endpoint: String,
    /// Maximum number of tasks held simultaneously. Adjustable by the
    /// worker at any heartbeat; re-read on every pull.
    pub concurrency: u32,
    pub current_jobs: u32,
    #[serde(serialize_with = "sorted_ids")]
    pub jobs_in_progress: HashSet<TaskId>,
    pub last_heartbeat: Timestamp,
    pub registered_at: Timestamp,
}

impl Worker {
    pub fn new(id: impl Into<WorkerId>, endpoint: impl Into<String>, concurrency: u32) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            concurrency,
            current_jobs: 0,
            jobs_in_progress: HashSet::new(),
            last_heartbeat: now,
            registered_at: now,
        }
    }

    /// Free capacity as of now. Concurrency may have been lowered below the
    /// current load, so this saturates at zero.
    pub fn available_slots(&self) -> u32 {
        self.concurrency.saturating_sub(self.current_jobs)
    }

    pub fn is_online(&self, now: Timestamp, timeout: Duration) -> bool {
        (now - self.last_heartbeat).to_std().unwrap_or_default() < timeout
    }

    pub fn status(&self, now: Timestamp, timeout: Duration) -> WorkerStatus {
        if self.is_online(now, timeout) {
            WorkerStatus::Online
        } else {
            WorkerStatus::Offline
        }
    }
}

/// Serialize a set of task ids as a sorted list for stable JSON output.
fn sorted_ids<S: Serializer>(ids: &HashSet<TaskId>, ser: S) -> Result<S::Ok, S::Error> {
    let mut v: Vec<&TaskId> = ids.iter().collect();
    v.sort();
    ser.collect_seq(v)
}

/// Per-endpoint statistics, computed from the task store and registry.
/// Never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointStats {
    pub endpoint: String,
    pub pending_tasks: u64,
    pub in_progress_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub online_workers: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_slots_saturates_when_concurrency_lowered() {
        let mut worker = Worker::new("w1", "default", 4);
        worker.current_jobs = 3;
        assert_eq!(worker.available_slots(), 1);

        worker.concurrency = 2;
        assert_eq!(worker.available_slots(), 0);
    }

    #[test]
    fn online_status_follows_heartbeat_recency() {
        let mut worker = Worker::new("w1", "default", 1);
        let now = chrono::Utc::now();
        assert_eq!(
            worker.status(now, Duration::from_secs(30)),
            WorkerStatus::Online
        );

        worker.last_heartbeat = now - chrono::Duration::seconds(60);
        assert_eq!(
            worker.status(now, Duration::from_secs(30)),
            WorkerStatus::Offline
        );
    }

    #[test]
    fn jobs_serialize_sorted() {
        let mut worker = Worker::new("w1", "default", 2);
        worker.jobs_in_progress.insert("b".to_string());
        worker.jobs_in_progress.insert("a".to_string());
        worker.current_jobs = 2;

        let json = serde_json::to_value(&worker).unwrap();
        assert_eq!(json["jobs_in_progress"], serde_json::json!(["a", "b"]));
    }
}
