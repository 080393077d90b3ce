use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use tombola_engine::EngineError;
use tombola_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Engine error: {0}")]
    Engine(EngineError),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation { field, message } => {
                ServerError::BadRequest(format!("{field} {message}"))
            }
            other => ServerError::Store(other),
        }
    }
}

impl From<EngineError> for ServerError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Invalid { field, message } => {
                ServerError::BadRequest(format!("{field} {message}"))
            }
            EngineError::Store(store) => ServerError::from(store),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Store(_) | ServerError::Engine(_) => {
                tracing::error!(error = %self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
