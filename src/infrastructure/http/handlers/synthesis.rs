//! 语音合成 handler

use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderMap;
use axum::Json;
use std::sync::Arc;

use crate::application::ApplicationError;
use crate::infrastructure::http::dto::SynthesisRequest;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// POST /api/text-to-speech
///
/// 返回 MP3 字节流，作为附件下载；输出文件发送后即删除
pub async fn text_to_speech(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SynthesisRequest>,
) -> Result<(HeaderMap, Vec<u8>), ApiError> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("Field 'text' is required"));
    }
    let voice = body
        .voice_name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(&state.default_voice)
        .to_string();

    let output_path = state
        .asset_store
        .allocate_output("mp3")
        .await
        .map_err(ApplicationError::from)?;

    let result = state.engine_client.synthesize(text, &voice, &output_path).await;
    if let Err(err) = result {
        remove_output(&output_path).await;
        return Err(ApplicationError::from(err).into());
    }

    let audio = tokio::fs::read(&output_path).await.map_err(|e| {
        ApiError::internal(format!("Failed to read synthesized audio: {}", e))
    });
    remove_output(&output_path).await;
    let audio = audio?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, "audio/mpeg".parse().unwrap());
    headers.insert(
        CONTENT_DISPOSITION,
        "attachment; filename=\"speech.mp3\"".parse().unwrap(),
    );
    Ok((headers, audio))
}

async fn remove_output(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove synthesis output");
        }
    }
}
