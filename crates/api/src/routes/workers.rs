//! Route definitions for worker listing and endpoint statistics.

use axum::routing::get;
use axum::Router;

use crate::handlers::workers;
use crate::state::AppState;

/// Routes mounted under `/v1`.
///
/// ```text
/// GET    /workers              -> list_workers
/// GET    /{endpoint}/stats     -> endpoint_stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workers", get(workers::list_workers))
        .route("/{endpoint}/stats", get(workers::endpoint_stats))
}
