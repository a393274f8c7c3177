//! `POST /logs` — accepts a raw log, stamps a trace id and config
//! snapshot, and pushes it into the batcher. Grounded on
//! `original_source/server/handlers/LogHandler.cpp::handlePost`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::batch_processor::process_batch;
use crate::batcher::DispatchedBatch;
use crate::state::AppState;
use crate::types::AnalysisTask;

#[derive(Serialize)]
pub struct IngestResponse {
    pub trace_id: String,
}

pub async fn ingest_log(State(state): State<Arc<AppState>>, body: String) -> impl IntoResponse {
    let trace_id = state.generate_trace_id();
    let snapshot = state.config_store.get_snapshot();

    let task = AnalysisTask {
        trace_id: trace_id.clone(),
        raw_request_body: body,
        ai_api_key: snapshot.app_config.ai_api_key.clone(),
        ai_model: snapshot.app_config.ai_model.clone(),
        ai_provider: snapshot.app_config.ai_provider.clone(),
        active_prompt: snapshot.active_map_prompt.clone(),
        started_at: Instant::now(),
    };

    let pool = state.pool.clone();
    let dispatch = crate::handlers::make_dispatcher(&state);

    let accepted = state
        .batcher
        .push(task, &pool, dispatch)
        .await;

    if accepted {
        (StatusCode::ACCEPTED, Json(IngestResponse { trace_id })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "Server is overloaded" })),
        )
            .into_response()
    }
}
