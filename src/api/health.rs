use axum::Json;
use serde_json::{Value, json};

pub async fn root() -> &'static str {
    "API running"
}

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn test() -> Json<Value> {
    Json(json!({ "message": "Test OK" }))
}
