//! `GET /dashboard` — O(1) read of the in-memory stats snapshot. Grounded
//! on `original_source/server/handlers/DashboardHandler.cpp`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> Json<crate::types::DashboardStats> {
    Json(state.repo.get_dashboard_stats())
}
