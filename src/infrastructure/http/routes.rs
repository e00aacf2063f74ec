//! HTTP Routes
//!
//! API Endpoints:
//! - /                              GET   服务状态（免鉴权）
//! - /api/speech-to-text            POST  语音转写
//! - /api/pronunciation-assessment  POST  发音评测（reference_text 可选）
//! - /api/evaluate-pronunciation    POST  评测旧别名（reference_text 必填）
//! - /api/text-to-speech            POST  语音合成
//! - /api/intent-recognition        POST  意图识别
//! - /ws/recognize                  WS    流式识别

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::error::ApiError;
use super::handlers;
use super::middleware::api_key_auth;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/speech-to-text", post(handlers::speech_to_text))
        .route(
            "/pronunciation-assessment",
            post(handlers::pronunciation_assessment),
        )
        .route(
            "/evaluate-pronunciation",
            post(handlers::evaluate_pronunciation),
        )
        .route("/text-to-speech", post(handlers::text_to_speech))
        .route("/intent-recognition", post(handlers::intent_recognition))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            api_key_auth,
        ));

    Router::new()
        .route("/", get(handlers::service_status))
        .nest("/api", api)
        .route("/ws/recognize", get(handlers::recognize_ws))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine as _;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::util::ServiceExt;

    use crate::application::{
        AssessmentOrchestrator, RetryPolicy, RetryingEngineClient,
    };
    use crate::config::StreamingConfig;
    use crate::infrastructure::adapters::engine::FakeSpeechEngine;
    use crate::infrastructure::adapters::storage::TempAssetStore;
    use crate::infrastructure::memory::InMemoryResultCache;
    use crate::infrastructure::streaming::StreamingSessionManager;

    const TEST_KEY: &str = "test-api-key";

    fn test_router(scratch: &std::path::Path) -> Router {
        let engine = Arc::new(FakeSpeechEngine::with_defaults());
        let cache = Arc::new(InMemoryResultCache::new());
        let asset_store = Arc::new(
            TempAssetStore::new(scratch, 10 * 1024 * 1024, Duration::from_secs(1800)).unwrap(),
        );
        let engine_client = Arc::new(RetryingEngineClient::new(
            engine.clone(),
            cache,
            RetryPolicy {
                max_attempts: 3,
                delay: Duration::from_millis(1),
            },
            Duration::from_secs(300),
        ));
        let orchestrator = Arc::new(AssessmentOrchestrator::new(engine_client.clone()));

        let state = Arc::new(AppState {
            asset_store,
            engine,
            engine_client,
            orchestrator,
            streaming: Arc::new(StreamingSessionManager::new(4)),
            streaming_config: StreamingConfig::default(),
            api_key: TEST_KEY.to_string(),
            default_voice: "ja-JP-NanamiNeural".to_string(),
            max_upload_size: 10 * 1024 * 1024,
        });
        create_routes(state)
    }

    fn audio_json_body(reference_text: Option<&str>) -> String {
        let audio = base64::engine::general_purpose::STANDARD.encode(b"RIFFxxxxWAVEdata");
        let mut body = json!({ "audio": audio, "format": "wav", "user_id": "user-1" });
        if let Some(reference) = reference_text {
            body["reference_text"] = json!(reference);
        }
        body.to_string()
    }

    fn post_json(uri: &str, body: String, api_key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_requires_no_auth() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_401() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let response = app
            .oneshot(post_json("/api/speech-to-text", audio_json_body(None), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = response_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("API key"));
    }

    #[tokio::test]
    async fn test_api_key_accepted_via_query_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let uri = format!("/api/speech-to-text?api_key={}", TEST_KEY);
        let response = app
            .oneshot(post_json(&uri, audio_json_body(None), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404_with_error_body() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = response_json(response).await;
        assert_eq!(json["error"], "Not found");
    }

    #[tokio::test]
    async fn test_speech_to_text_json_base64() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let response = app
            .oneshot(post_json(
                "/api/speech-to-text",
                audio_json_body(None),
                Some(TEST_KEY),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["transcription"], "こんにちは、元気です");
        assert!(json["timestamp"].is_string());

        // 请求结束后暂存目录为空
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_assessment_reading_vs_speaking_shape() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let reading = app
            .clone()
            .oneshot(post_json(
                "/api/pronunciation-assessment",
                audio_json_body(Some("こんにちは")),
                Some(TEST_KEY),
            ))
            .await
            .unwrap();
        assert_eq!(reading.status(), StatusCode::OK);
        let reading = response_json(reading).await;
        assert_eq!(reading["assessment_mode"], "Reading");
        assert!(reading["pronunciation_scores"]["completeness"].is_number());
        assert!(reading["benchmark_comparison"].is_object());

        let speaking = app
            .oneshot(post_json(
                "/api/pronunciation-assessment",
                audio_json_body(None),
                Some(TEST_KEY),
            ))
            .await
            .unwrap();
        assert_eq!(speaking.status(), StatusCode::OK);
        let speaking = response_json(speaking).await;
        assert_eq!(speaking["assessment_mode"], "Speaking");
        assert!(speaking["pronunciation_scores"]["completeness"].is_null());
        assert!(speaking.get("benchmark_comparison").is_none());
    }

    #[tokio::test]
    async fn test_evaluate_requires_reference_text() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/evaluate-pronunciation",
                audio_json_body(None),
                Some(TEST_KEY),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        // 校验失败时不应留下已落盘的资产
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let ok = app
            .oneshot(post_json(
                "/api/evaluate-pronunciation",
                audio_json_body(Some("こんにちは")),
                Some(TEST_KEY),
            ))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_audio_payload_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        // 扩展名 wav 但内容不是 RIFF
        let audio = base64::engine::general_purpose::STANDARD.encode(b"not-a-wav");
        let body = json!({ "audio": audio, "format": "wav" }).to_string();
        let response = app
            .oneshot(post_json("/api/speech-to-text", body, Some(TEST_KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_text_to_speech_returns_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let body = json!({ "text": "こんにちは" }).to_string();
        let response = app
            .oneshot(post_json("/api/text-to-speech", body, Some(TEST_KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "audio/mpeg"
        );
        assert!(response
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("attachment"));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(!bytes.is_empty());
    }

    #[tokio::test]
    async fn test_intent_recognition_from_text() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let body = json!({ "text": "こんにちは" }).to_string();
        let response = app
            .oneshot(post_json("/api/intent-recognition", body, Some(TEST_KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["intent"]["top"], "Greeting");
        assert_eq!(json["query"], "こんにちは");
    }
}
