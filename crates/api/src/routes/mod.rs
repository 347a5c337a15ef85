pub mod health;
pub mod runpod;
pub mod tasks;
pub mod workers;

use axum::Router;

use crate::state::AppState;

/// Build the `/v1` route tree (client-facing API).
///
/// Route hierarchy:
///
/// ```text
/// /run                     submit to the default endpoint (POST)
/// /runsync                 synchronous submit, default endpoint (POST)
/// /{endpoint}/run          submit (POST)
/// /{endpoint}/runsync      synchronous submit (POST)
/// /{endpoint}/stats        endpoint statistics (GET)
///
/// /tasks                   filtered task listing (GET)
/// /status/{id}             task snapshot (GET)
/// /cancel/{id}             cancel (POST, idempotent)
/// /stream/{id}             live task output via SSE (GET)
///
/// /workers                 online workers, ?endpoint= filter (GET)
/// ```
pub fn v1_routes() -> Router<AppState> {
    Router::new()
        .merge(tasks::router())
        .merge(workers::router())
}
