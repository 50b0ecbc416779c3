use crate::AppState;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "connections": state.hub.connection_count().await,
        "ai_enabled": state.ai.is_enabled(),
        "cache": state.cache.stats().await,
    }))
}

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    tracing::debug!(path = %uri.path(), "No route matched");
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found", "path": uri.path() })),
    )
}
