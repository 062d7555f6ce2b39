use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::api::envelope::now_timestamp;
use crate::app::AppState;
use crate::middleware::ApiResponse;

/// GET /health - Liveness probe. No guard, no cache, no store I/O.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "ok",
        "service": state.config.server.service_name,
        "timestamp": now_timestamp(),
    }))
}

/// GET / - Service index
pub async fn root(State(state): State<AppState>) -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": state.config.server.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health (public)",
            "contacts": "/contacts[/:id[/favorite]] (protected)",
            "notifications": "/notifications[/:id[/read]|/read-all] (protected)",
            "jobs": "/jobs[/:id] (protected)",
        }
    }))
}
