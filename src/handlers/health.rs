use axum::Json;
use serde_json::{Value, json};

/// Handler for GET /api/health
pub async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
