//! 意图识别 handler

use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::application::ApplicationError;
use crate::domain::intent::classify_intent;
use crate::infrastructure::http::dto::{parse_audio_json, parse_audio_request, IntentTextBody};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// POST /api/intent-recognition
///
/// 载荷可以是 JSON 文本，也可以是音频（multipart 或 base64），
/// 音频先转写再做意图分类
pub async fn intent_recognition(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let (text, user_id) = if content_type.starts_with("multipart/form-data") {
        let parsed = parse_audio_request(request, state.max_upload_size).await?;
        let user_id = parsed.user_id().to_string();
        let text = transcribe(&state, &parsed.audio, &parsed.extension).await?;
        (text, user_id)
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), state.max_upload_size)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {}", e)))?;
        match serde_json::from_slice::<IntentTextBody>(&bytes) {
            Ok(body) if !body.text.trim().is_empty() => {
                let user_id = body.user_id.unwrap_or_else(|| "anonymous".to_string());
                (body.text, user_id)
            }
            _ => {
                let parsed = parse_audio_json(&bytes)?;
                let user_id = parsed.user_id().to_string();
                let text = transcribe(&state, &parsed.audio, &parsed.extension).await?;
                (text, user_id)
            }
        }
    };

    let analysis = classify_intent(&text);
    Ok(Json(json!({
        "user_id": user_id,
        "query": analysis.query,
        "intent": {
            "top": analysis.top_intent,
            "confidence": analysis.confidence,
        },
        "intents": analysis.intents,
        "entities": analysis.entities,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

async fn transcribe(state: &AppState, audio: &[u8], extension: &str) -> Result<String, ApiError> {
    let asset = state
        .asset_store
        .stage(audio, extension)
        .await
        .map_err(ApplicationError::from)?;
    let result = state.engine_client.transcribe(&asset).await;
    state.asset_store.release(&asset).await;
    Ok(result.map_err(ApplicationError::from)?)
}
