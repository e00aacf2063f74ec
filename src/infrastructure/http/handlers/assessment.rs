//! 发音评测 handler

use axum::extract::{Request, State};
use axum::Json;
use std::sync::Arc;

use crate::application::{ApplicationError, AssessmentOutcome};
use crate::infrastructure::http::dto::{parse_audio_request, AudioRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// POST /api/pronunciation-assessment
///
/// reference_text 可选：有则 Reading 模式，无则 Speaking 模式
pub async fn pronunciation_assessment(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AssessmentOutcome>, ApiError> {
    let parsed = parse_audio_request(request, state.max_upload_size).await?;
    run_assessment(&state, parsed).await
}

/// POST /api/evaluate-pronunciation
///
/// pronunciation-assessment 的旧别名，reference_text 必填
pub async fn evaluate_pronunciation(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AssessmentOutcome>, ApiError> {
    let parsed = parse_audio_request(request, state.max_upload_size).await?;
    // 校验先于资产落盘，避免无谓的引擎调用
    let has_reference = parsed
        .reference_text
        .as_deref()
        .map(str::trim)
        .is_some_and(|s| !s.is_empty());
    if !has_reference {
        return Err(ApiError::bad_request("Field 'reference_text' is required"));
    }
    run_assessment(&state, parsed).await
}

async fn run_assessment(
    state: &AppState,
    parsed: AudioRequest,
) -> Result<Json<AssessmentOutcome>, ApiError> {
    let user_id = parsed.user_id().to_string();
    let asset = state
        .asset_store
        .stage(&parsed.audio, &parsed.extension)
        .await
        .map_err(ApplicationError::from)?;

    let result = state
        .orchestrator
        .assess(&asset, parsed.reference_text.as_deref(), &user_id)
        .await;
    state.asset_store.release(&asset).await;

    Ok(Json(result?))
}
