use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::TaskId;
use thiserror::Error;

/// Errores de frontera de Submit / GetStatus.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("query must not be empty")]
    InvalidQuery,

    #[error("Task not found: {0}")]
    NotFound(TaskId),
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = match self {
            OrchestratorError::InvalidQuery => StatusCode::BAD_REQUEST,
            OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Fallos del executor de investigación externo.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// El mensaje se muestra tal cual en el campo `error` de la tarea
    #[error("{0}")]
    Failed(String),

    #[error("research executor request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("research executor responded with status {0}")]
    Status(reqwest::StatusCode),
}
