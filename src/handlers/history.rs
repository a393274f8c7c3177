//! `GET /history` — paginated, filterable historical log query. Grounded
//! on `original_source/server/handlers/HistoryHandler.cpp`, which treats
//! every query param as optional and defensively parsed rather than
//! rejecting malformed input with a 400.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::error;

use crate::repository::log_unexpected_db_error;
use crate::state::AppState;

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let page = params
        .get("page")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(1);
    let page_size = params
        .get("pageSize")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(20);
    let level = params.get("level").cloned().unwrap_or_default();
    let keyword = params.get("keyword").cloned().unwrap_or_default();

    match state.repo.get_historical_logs(page, page_size, &level, &keyword).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => {
            log_unexpected_db_error("get_history", &e);
            error!(error = %e, "failed to query historical logs");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}
