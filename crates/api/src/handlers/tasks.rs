//! Handlers for task submission, status, and cancellation.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use conveyor_core::types::{Timestamp, WorkerId};
use conveyor_core::{DispatchError, Task, TaskStatus};
use conveyor_dispatch::TaskFilter;

use crate::error::AppResult;
use crate::state::AppState;

/// Page size used when a listing request names no `limit`.
const DEFAULT_LIST_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for POST /run and /runsync.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// Opaque input document, passed through to the worker unmodified.
    pub input: Option<serde_json::Value>,
}

impl RunRequest {
    fn into_input(self) -> Result<serde_json::Value, DispatchError> {
        self.input.ok_or_else(|| {
            DispatchError::Validation("request body must contain an \"input\" document".into())
        })
    }
}

/// Response for POST /run.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub id: String,
    pub status: TaskStatus,
}

/// Query parameters for POST /runsync.
#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    /// Wait budget in seconds; defaults to the configured budget and is
    /// capped by `MAX_SYNC_WAIT_SECS`.
    pub wait: Option<u64>,
}

/// Response for POST /runsync: the final (or latest, on timeout) snapshot.
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub delay_ms: i64,
    pub execution_ms: i64,
}

impl From<Task> for SyncResponse {
    fn from(task: Task) -> Self {
        Self {
            delay_ms: task.delay_ms(),
            execution_ms: task.execution_ms(),
            id: task.id,
            status: task.status,
            output: task.output,
            error: task.error,
        }
    }
}

/// Response for GET /status/{id}.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: TaskStatus,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    pub delay_ms: i64,
    pub execution_ms: i64,
}

impl From<Task> for StatusResponse {
    fn from(task: Task) -> Self {
        Self {
            delay_ms: task.delay_ms(),
            execution_ms: task.execution_ms(),
            id: task.id,
            status: task.status,
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            output: task.output,
            error: task.error,
            worker_id: task.assigned_worker,
        }
    }
}

/// Query parameters for GET /tasks.
#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    /// Status filter, in wire form (e.g. `IN_PROGRESS`).
    pub status: Option<String>,
    pub endpoint: Option<String>,
    /// Exact-match task id.
    pub task_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Response for GET /tasks.
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<StatusResponse>,
    /// Matching tasks before pagination.
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

/// Response for POST /cancel/{id}.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub id: String,
    pub status: TaskStatus,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// POST /v1/run -- submit to the default endpoint.
pub async fn run_default(
    state: State<AppState>,
    body: Json<RunRequest>,
) -> AppResult<Json<RunResponse>> {
    run(Path(String::new()), state, body).await
}

/// POST /v1/{endpoint}/run -- submit a task and return immediately.
pub async fn run(
    Path(endpoint): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<RunRequest>,
) -> AppResult<Json<RunResponse>> {
    let input = body.into_input()?;
    let task = state.dispatcher.submit(&endpoint, input).await;
    Ok(Json(RunResponse {
        id: task.id,
        status: task.status,
    }))
}

/// POST /v1/runsync -- synchronous submit to the default endpoint.
pub async fn run_sync_default(
    state: State<AppState>,
    query: Query<SyncQuery>,
    body: Json<RunRequest>,
) -> AppResult<Json<SyncResponse>> {
    run_sync(Path(String::new()), state, query, body).await
}

/// POST /v1/{endpoint}/runsync -- submit and wait for a terminal state.
///
/// On timeout the response simply carries the task's current (non-terminal)
/// status; the task keeps running and remains pollable via /status.
pub async fn run_sync(
    Path(endpoint): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
    Json(body): Json<RunRequest>,
) -> AppResult<Json<SyncResponse>> {
    let input = body.into_input()?;

    let budget_secs = query
        .wait
        .unwrap_or(state.config.sync_wait_timeout_secs)
        .min(state.config.max_sync_wait_secs);
    let budget = Duration::from_secs(budget_secs);

    let outcome = state.dispatcher.run_sync(&endpoint, input, budget).await;
    if outcome.timed_out {
        tracing::debug!(
            task_id = %outcome.task.id,
            budget_secs,
            "Synchronous wait budget elapsed, returning snapshot"
        );
    }
    Ok(Json(SyncResponse::from(outcome.task)))
}

// ---------------------------------------------------------------------------
// Status and cancellation
// ---------------------------------------------------------------------------

/// GET /v1/tasks -- filtered task listing, newest first.
///
/// An unknown `status` value is a validation error rather than an empty
/// match.
pub async fn list(
    Query(query): Query<ListTasksQuery>,
    State(state): State<AppState>,
) -> AppResult<Json<TaskListResponse>> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<TaskStatus>())
        .transpose()?;
    let filter = TaskFilter {
        status,
        endpoint: query.endpoint,
        task_id: query.task_id,
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let page = state.dispatcher.list_tasks(&filter, limit, offset).await;
    Ok(Json(TaskListResponse {
        tasks: page.tasks.into_iter().map(StatusResponse::from).collect(),
        total: page.total,
        limit,
        offset,
    }))
}

/// GET /v1/status/{id} -- full task snapshot.
pub async fn status(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<StatusResponse>> {
    let task = state.dispatcher.get(&id).await?;
    Ok(Json(StatusResponse::from(task)))
}

/// POST /v1/cancel/{id} -- cancel a task. Idempotent: cancelling a task
/// that already finished returns the unchanged terminal snapshot.
pub async fn cancel(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Json<CancelResponse>> {
    let task = state.dispatcher.cancel(&id).await?;
    let message = match task.status {
        TaskStatus::Cancelled => "task cancelled".to_string(),
        other => format!("task already {other}"),
    };
    Ok(Json(CancelResponse {
        id: task.id,
        status: task.status,
        message,
    }))
}
