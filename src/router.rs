//! HTTP route registration, grounded on `hub/api/mod.rs`'s
//! nest-routes-then-layer shape. CORS is explicit rather than
//! `CorsLayer::permissive()` because the surface commits to a fixed
//! max-age rather than mirroring the request's own headers.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{dashboard, history, ingest, results, settings};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(86_400));

    Router::new()
        .route("/logs", post(ingest::ingest_log))
        .route("/results/{trace_id}", get(results::get_result))
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/history", get(history::get_history))
        .route("/settings/all", get(settings::get_all))
        .route("/settings/config", post(settings::update_app_config))
        .route("/settings/prompts", post(settings::update_prompts))
        .route("/settings/channels", post(settings::update_channels))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "404 Not Found", "path": uri.path() })),
    )
}
