//! Route definitions for the worker pull protocol.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::runpod;
use crate::state::AppState;

/// Routes mounted at `/runpod`.
///
/// ```text
/// GET    /job-take/{worker_id}              -> job_take (claim next task)
/// POST   /ping/{worker_id}                  -> ping (heartbeat)
/// POST   /job-done/{worker_id}/{task_id}    -> job_done (final result)
/// POST   /job-stream/{worker_id}/{task_id}  -> job_stream (output chunk)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/job-take/{worker_id}", get(runpod::job_take))
        .route("/ping/{worker_id}", post(runpod::ping))
        .route("/job-done/{worker_id}/{task_id}", post(runpod::job_done))
        .route("/job-stream/{worker_id}/{task_id}", post(runpod::job_stream))
}
