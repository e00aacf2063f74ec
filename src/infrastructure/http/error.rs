//! API 错误响应
//!
//! 应用层错误映射为 `{"error": message}` 加对应的 4xx/5xx 状态码。
//! 瞬时引擎错误在重试耗尽后只暴露通用消息，不泄漏引擎细节

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::application::ApplicationError;

/// API 错误
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        match err {
            ApplicationError::Validation(msg) => Self::bad_request(msg),
            ApplicationError::Unauthorized(msg) => Self::unauthorized(msg),
            ApplicationError::NotFound(msg) => Self::not_found(msg),
            ApplicationError::Engine(engine_err) if engine_err.is_transient() => {
                // 重试耗尽的瞬时错误，对客户端只给通用消息
                Self::internal("Speech engine temporarily unavailable")
            }
            ApplicationError::Engine(engine_err) => Self::internal(engine_err.to_string()),
            ApplicationError::Storage(msg) => Self::internal(msg),
            ApplicationError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::EngineError;

    #[test]
    fn test_validation_maps_to_400() {
        let err: ApiError = ApplicationError::validation("bad input").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "bad input");
    }

    #[test]
    fn test_transient_engine_error_gets_generic_message() {
        let err: ApiError = ApplicationError::Engine(EngineError::Timeout).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Speech engine temporarily unavailable");
    }

    #[test]
    fn test_fatal_engine_error_keeps_underlying_message() {
        let err: ApiError =
            ApplicationError::Engine(EngineError::Service("bad request".into())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("bad request"));
    }
}
