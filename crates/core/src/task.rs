//! Task record and lifecycle status.

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, WorkerId};

/// Lifecycle status of a task.
///
/// Transitions:
///
/// ```text
/// PENDING ----> IN_PROGRESS ----> COMPLETED
///    |              |       \---> FAILED
///    |              |\----------> CANCELLED
///    |              \-----------> PENDING      (requeue after eviction)
///    \------------------------->  CANCELLED
/// ```
///
/// `COMPLETED`, `FAILED`, and `CANCELLED` are terminal; late worker reports
/// against a terminal task are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Whether this status accepts no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = crate::error::DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            "CANCELLED" => Ok(TaskStatus::Cancelled),
            other => Err(crate::error::DispatchError::Validation(format!(
                "unknown task status: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// A unit of submitted work with opaque input/output documents.
///
/// The task store is the exclusive owner of these records; everything else
/// (queues, workers) holds only task ids.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: String,
    /// Routing key selecting which worker pool may serve the task.
    pub endpoint: String,
    /// Opaque input document, passed through unmodified.
    pub input: serde_json::Value,
    pub status: TaskStatus,
    /// Opaque output document, set on success only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Textual error description, set only on `FAILED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Worker currently holding the task. Set iff `status == IN_PROGRESS`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_worker: Option<WorkerId>,
    /// How many times the task has been requeued after worker eviction.
    pub retries: u32,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl Task {
    /// Create a fresh `PENDING` task with a generated id.
    pub fn new(endpoint: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            endpoint: endpoint.into(),
            input,
            status: TaskStatus::Pending,
            output: None,
            error: None,
            assigned_worker: None,
            retries: 0,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Milliseconds between submission and assignment, once started.
    pub fn delay_ms(&self) -> i64 {
        self.started_at
            .map(|s| (s - self.created_at).num_milliseconds())
            .unwrap_or(0)
    }

    /// Milliseconds between assignment and completion, once finished.
    pub fn execution_ms(&self) -> i64 {
        match (self.started_at, self.completed_at) {
            (Some(s), Some(c)) => (c - s).num_milliseconds(),
            _ => 0,
        }
    }
}
