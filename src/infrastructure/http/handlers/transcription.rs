//! 语音转写 handler

use axum::extract::{Request, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::application::ApplicationError;
use crate::infrastructure::http::dto::parse_audio_request;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// POST /api/speech-to-text
pub async fn speech_to_text(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    let parsed = parse_audio_request(request, state.max_upload_size).await?;
    let user_id = parsed.user_id().to_string();

    let asset = state
        .asset_store
        .stage(&parsed.audio, &parsed.extension)
        .await
        .map_err(ApplicationError::from)?;

    // 结果先落地再释放资产，释放失败不影响请求结果
    let result = state.engine_client.transcribe(&asset).await;
    state.asset_store.release(&asset).await;
    let transcription = result.map_err(ApplicationError::from)?;

    Ok(Json(json!({
        "user_id": user_id,
        "transcription": transcription,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
