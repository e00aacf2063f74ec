//! 服务状态

use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

/// GET / - 服务存活探针，不需要鉴权
pub async fn service_status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "hatsuon",
        "version": env!("CARGO_PKG_VERSION"),
        "features": [
            "speech-to-text",
            "pronunciation-assessment",
            "text-to-speech",
            "intent-recognition",
            "streaming-recognition",
        ],
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
