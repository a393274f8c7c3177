//! `GET /results/:trace_id` — looks up a single analysis result. Grounded
//! on `original_source/server/handlers/LogHandler.cpp::handleGetResult`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::error;

use crate::repository::log_unexpected_db_error;
use crate::state::AppState;

pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(trace_id): Path<String>,
) -> impl IntoResponse {
    match state.repo.query_struct_result_by_trace_id(&trace_id).await {
        Ok(Some(result)) => {
            (StatusCode::OK, Json(serde_json::json!({ "trace_id": trace_id, "result": result })))
                .into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Trace ID not found" })),
        )
            .into_response(),
        Err(e) => {
            log_unexpected_db_error("get_result", &e);
            error!(error = %e, "failed to look up analysis result");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}
