use axum::response::IntoResponse;
use axum::{Json, extract::State};
use std::sync::Arc;

use crate::router::WRITE_PATH;
use crate::state::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "sanity-write-proxy",
        "writePath": WRITE_PATH,
        "rateLimiter": state.rate_limiter.backend(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
