//! Handlers for worker listing and endpoint statistics.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use conveyor_core::{EndpointStats, Worker, WorkerStatus};

use crate::state::AppState;

/// Query parameters for GET /workers.
#[derive(Debug, Deserialize)]
pub struct WorkersQuery {
    /// Restrict the listing to one endpoint.
    pub endpoint: Option<String>,
}

/// A worker record with its derived liveness status.
#[derive(Debug, Serialize)]
pub struct WorkerView {
    pub status: WorkerStatus,
    #[serde(flatten)]
    pub worker: Worker,
}

/// GET /v1/workers -- online workers, optionally filtered by `?endpoint=`.
pub async fn list_workers(
    Query(query): Query<WorkersQuery>,
    State(state): State<AppState>,
) -> Json<Vec<WorkerView>> {
    let now = chrono::Utc::now();
    let timeout = state.dispatcher.config().heartbeat_timeout;

    let workers = state
        .dispatcher
        .list_workers(query.endpoint.as_deref())
        .await
        .into_iter()
        .map(|worker| WorkerView {
            status: worker.status(now, timeout),
            worker,
        })
        .collect();
    Json(workers)
}

/// GET /v1/{endpoint}/stats -- per-endpoint task and worker counts.
pub async fn endpoint_stats(
    Path(endpoint): Path<String>,
    State(state): State<AppState>,
) -> Json<EndpointStats> {
    Json(state.dispatcher.endpoint_stats(&endpoint).await)
}
