// src/errors.rs
// Crate-wide error type and its HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub type RecalldResult<T> = Result<T, RecalldError>;

#[derive(Debug, Error)]
pub enum RecalldError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("failed to load vector index: {0}")]
    VectorIndexLoad(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for RecalldError {
    fn into_response(self) -> Response {
        let status = match &self {
            RecalldError::Validation(_) => StatusCode::BAD_REQUEST,
            RecalldError::NotFound(_) => StatusCode::NOT_FOUND,
            RecalldError::Upstream(_) => StatusCode::BAD_GATEWAY,
            RecalldError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RecalldError::VectorIndexLoad(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RecalldError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RecalldError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
