//! Typed service errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Downstream worker pool (or batcher ring) is at capacity.
    #[error("server is overloaded")]
    Overload,

    /// Requested resource (trace id, etc.) does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Caller-supplied input failed validation.
    #[error("{0}")]
    ClientInput(String),

    /// The external analyzer call failed or returned an invalid payload.
    #[error("analyzer error: {0}")]
    ExternalFailure(String),

    /// A database operation failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Startup-time failure (DB open, migration, bind).
    #[error("startup error: {0}")]
    Startup(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Overload => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ClientInput(_) => StatusCode::BAD_REQUEST,
            Self::ExternalFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Startup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
