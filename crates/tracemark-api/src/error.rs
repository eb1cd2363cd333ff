use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracemark_engine::EngineError;
use tracemark_types::api::ErrorBody;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("missing or invalid bearer token")]
    Unauthenticated,
    #[error("internal error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ApiError::Engine(EngineError::Validation(_)) => (StatusCode::BAD_REQUEST, "validation"),
            ApiError::Engine(EngineError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Engine(EngineError::Unauthorized(_)) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::Engine(EngineError::Storage(e)) => {
                error!("Storage error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        // Storage details stay in the log.
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "internal error".to_string(),
            _ => self.to_string(),
        };
        let body = ErrorBody {
            error: kind.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Run a blocking engine call off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
