//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`TaskEventBus`] fans out [`TaskEvent`]s to any number of subscribers.
//! It is designed to be shared via `Arc<TaskEventBus>` across the
//! application. Events for a given task are received in publish order, so
//! stream chunks arrive exactly as the worker emitted them.

use serde::Serialize;
use tokio::sync::broadcast;

use conveyor_core::types::{TaskId, Timestamp};
use conveyor_core::TaskStatus;

// ---------------------------------------------------------------------------
// TaskEvent
// ---------------------------------------------------------------------------

/// What happened to a task.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TaskEventKind {
    /// A partial-output chunk reported by the holding worker.
    Chunk(serde_json::Value),
    /// The task reached a terminal status. Always the last event for a task.
    Finished(TaskStatus),
}

/// An event on a single task's ordered event sequence.
#[derive(Debug, Clone, Serialize)]
pub struct TaskEvent {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub kind: TaskEventKind,
    pub timestamp: Timestamp,
}

impl TaskEvent {
    pub fn chunk(task_id: impl Into<TaskId>, output: serde_json::Value) -> Self {
        Self {
            task_id: task_id.into(),
            kind: TaskEventKind::Chunk(output),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn finished(task_id: impl Into<TaskId>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            kind: TaskEventKind::Finished(status),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Whether this event ends the task's event sequence.
    pub fn is_final(&self) -> bool {
        matches!(self.kind, TaskEventKind::Finished(_))
    }
}

// ---------------------------------------------------------------------------
// TaskEventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for task events.
///
/// When the buffer is full, the oldest un-consumed messages are dropped and
/// slow receivers observe `RecvError::Lagged`; consumers that care about the
/// terminal state fall back to a direct status query.
pub struct TaskEventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl TaskEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// a task with no sync waiter and no stream consumer needs no delivery.
    pub fn publish(&self, event: TaskEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

impl Default for TaskEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
