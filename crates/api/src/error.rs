use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use conveyor_core::DispatchError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`DispatchError`] for domain errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `conveyor_core`.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- DispatchError variants ---
            AppError::Dispatch(err) => match err {
                DispatchError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                DispatchError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                DispatchError::Conflict(msg) => {
                    // Conflicts are routine under worker retries; worth a
                    // trace but not an error.
                    tracing::warn!(error = %msg, "Conflicting request rejected");
                    (StatusCode::CONFLICT, "CONFLICT", msg.clone())
                }
                DispatchError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal dispatch error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::Dispatch(DispatchError::NotFound {
            entity: "Task",
            id: "t1".into(),
        });
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = AppError::Dispatch(DispatchError::Conflict("held elsewhere".into()));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_maps_to_400() {
        let err = AppError::Dispatch(DispatchError::Validation("missing input".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
