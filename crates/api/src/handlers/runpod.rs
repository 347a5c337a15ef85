//! Handlers for the worker pull protocol.
//!
//! Workers poll `/runpod/job-take/{worker_id}` for work, heartbeat via
//! `/runpod/ping/{worker_id}`, and report results and stream chunks back
//! through `job-done` / `job-stream`. Stale or duplicate reports come back
//! as 409; workers treat that as "already handled" and move on.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use conveyor_core::{DispatchError, TaskStatus};
use conveyor_dispatch::TaskOutcome;

use crate::error::AppResult;
use crate::handlers::workers::WorkerView;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Query parameters for GET /job-take/{worker_id}.
#[derive(Debug, Deserialize)]
pub struct JobTakeQuery {
    pub endpoint: Option<String>,
}

/// Response for a successful job take.
#[derive(Debug, Serialize)]
pub struct JobTakeResponse {
    pub id: String,
    pub input: serde_json::Value,
}

/// Optional request body for POST /ping/{worker_id}.
#[derive(Debug, Default, Deserialize)]
pub struct PingRequest {
    pub endpoint: Option<String>,
    /// New concurrency limit; takes effect on the worker's next pull.
    pub concurrency: Option<u32>,
}

/// Request body for POST /job-done/{worker_id}/{task_id}.
#[derive(Debug, Deserialize)]
pub struct JobDoneRequest {
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Request body for POST /job-stream/{worker_id}/{task_id}.
#[derive(Debug, Deserialize)]
pub struct JobStreamRequest {
    pub output: Option<serde_json::Value>,
}

/// Response acknowledging a result or chunk report.
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: String,
    pub status: TaskStatus,
}

// ---------------------------------------------------------------------------
// Pull protocol
// ---------------------------------------------------------------------------

/// GET /runpod/job-take/{worker_id} -- claim the next task.
///
/// 200 with `{"id","input"}` when a task is claimed, 204 when the queue has
/// nothing eligible or the worker is at capacity. A pull doubles as a
/// heartbeat and registers unknown workers.
pub async fn job_take(
    Path(worker_id): Path<String>,
    Query(query): Query<JobTakeQuery>,
    State(state): State<AppState>,
) -> Response {
    let endpoint = query.endpoint.as_deref().unwrap_or("");
    match state.dispatcher.take_next(endpoint, &worker_id).await {
        Some(task) => Json(JobTakeResponse {
            id: task.id,
            input: task.input,
        })
        .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// POST /runpod/ping/{worker_id} -- heartbeat, with optional registration
/// details in the body.
pub async fn ping(
    Path(worker_id): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<PingRequest>>,
) -> Json<WorkerView> {
    let Json(body) = body.unwrap_or_default();
    let endpoint = body.endpoint.as_deref().unwrap_or("");

    let worker = state
        .dispatcher
        .heartbeat(&worker_id, endpoint, body.concurrency)
        .await;
    let now = chrono::Utc::now();
    let timeout = state.dispatcher.config().heartbeat_timeout;
    Json(WorkerView {
        status: worker.status(now, timeout),
        worker,
    })
}

/// POST /runpod/job-done/{worker_id}/{task_id} -- final result report.
///
/// A non-empty `error` marks the task failed; otherwise `output` (or null)
/// completes it.
pub async fn job_done(
    Path((worker_id, task_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<JobDoneRequest>,
) -> AppResult<Json<ReportResponse>> {
    let outcome = match body.error.filter(|e| !e.is_empty()) {
        Some(error) => TaskOutcome::Failure(error),
        None => TaskOutcome::Success(body.output.unwrap_or(serde_json::Value::Null)),
    };

    let task = state
        .dispatcher
        .report_result(&task_id, &worker_id, outcome)
        .await?;
    Ok(Json(ReportResponse {
        id: task.id,
        status: task.status,
    }))
}

/// POST /runpod/job-stream/{worker_id}/{task_id} -- publish one
/// partial-output chunk for an in-flight task.
pub async fn job_stream(
    Path((worker_id, task_id)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(body): Json<JobStreamRequest>,
) -> AppResult<StatusCode> {
    let output = body.output.ok_or_else(|| {
        DispatchError::Validation("request body must contain an \"output\" document".into())
    })?;

    state
        .dispatcher
        .report_chunk(&task_id, &worker_id, output)
        .await?;
    Ok(StatusCode::OK)
}
