use axum::Json;
use serde_json::{json, Value};

/// Liveness probe; never touches the catalog or the store.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
