//! `/settings/*` — read the flattened config/prompt/channel view, and
//! write each of the three update payloads back through the config
//! store. Grounded on `original_source/server/handlers/ConfigHandler.cpp`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use crate::state::AppState;
use crate::types::{AlertChannel, PromptConfig};

pub async fn get_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config_store.get_all_settings())
}

#[derive(Deserialize)]
pub struct AppConfigUpdate {
    #[serde(default)]
    pub items: Vec<Value>,
}

pub async fn update_app_config(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AppConfigUpdate>,
) -> impl IntoResponse {
    match state.config_store.update_app_config(&payload.items).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "success" }))).into_response(),
        Err(e) => {
            error!(error = %e, "failed to update app config");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "Failed to update configuration" })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct PromptsUpdate {
    #[serde(default)]
    pub prompts: Vec<PromptConfig>,
}

pub async fn update_prompts(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PromptsUpdate>,
) -> impl IntoResponse {
    if payload.prompts.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "No prompts supplied" })),
        )
            .into_response();
    }
    match state.config_store.update_prompts(&payload.prompts).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "success" }))).into_response(),
        Err(e) => {
            error!(error = %e, "failed to update prompts");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "Failed to update prompts" })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct ChannelsUpdate {
    #[serde(default)]
    pub channels: Vec<AlertChannel>,
}

pub async fn update_channels(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChannelsUpdate>,
) -> impl IntoResponse {
    if payload.channels.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "No channels supplied" })),
        )
            .into_response();
    }
    match state.config_store.update_channels(&payload.channels).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "success" }))).into_response(),
        Err(e) => {
            error!(error = %e, "failed to update alert channels");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "Failed to update channels" })),
            )
                .into_response()
        }
    }
}
