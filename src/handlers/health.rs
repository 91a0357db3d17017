use axum::response::Json;
use serde_json::{json, Value};

/// Liveness probe used by the admin frontend before enabling publishing.
pub async fn ping() -> Json<Value> {
    Json(json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION")
    }))
}
