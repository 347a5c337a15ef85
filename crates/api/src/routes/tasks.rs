//! Route definitions for task submission and lifecycle.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{stream, tasks};
use crate::state::AppState;

/// Routes mounted under `/v1`.
///
/// ```text
/// POST   /run                  -> run_default
/// POST   /runsync              -> run_sync_default
/// POST   /{endpoint}/run       -> run
/// POST   /{endpoint}/runsync   -> run_sync
/// GET    /tasks                -> list (filtered, paginated)
/// GET    /status/{id}          -> status
/// POST   /cancel/{id}          -> cancel
/// GET    /stream/{id}          -> stream_task (SSE)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/run", post(tasks::run_default))
        .route("/runsync", post(tasks::run_sync_default))
        .route("/{endpoint}/run", post(tasks::run))
        .route("/{endpoint}/runsync", post(tasks::run_sync))
        .route("/tasks", get(tasks::list))
        .route("/status/{id}", get(tasks::status))
        .route("/cancel/{id}", post(tasks::cancel))
        .route("/stream/{id}", get(stream::stream_task))
}
