//! HTTP 中间件
//!
//! API key 鉴权与 4xx/5xx 日志

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";
const API_KEY_QUERY: &str = "api_key";

/// API key 鉴权中间件
///
/// key 可放在 x-api-key 请求头或 api_key 查询参数
pub async fn api_key_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let header_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let query_key = request
        .uri()
        .query()
        .and_then(|query| extract_query_param(query, API_KEY_QUERY));

    let provided = header_key.or(query_key);
    match provided {
        Some(key) if key == state.api_key => next.run(request).await,
        Some(_) => {
            tracing::warn!(uri = %request.uri(), "Rejected request with invalid API key");
            ApiError::unauthorized("Invalid API key").into_response()
        }
        None => {
            tracing::warn!(uri = %request.uri(), "Rejected request without API key");
            ApiError::unauthorized("Missing API key").into_response()
        }
    }
}

fn extract_query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// HTTP 状态码错误日志中间件
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            "HTTP client error"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_extraction() {
        assert_eq!(
            extract_query_param("api_key=secret&x=1", "api_key"),
            Some("secret".to_string())
        );
        assert_eq!(
            extract_query_param("x=1&api_key=secret", "api_key"),
            Some("secret".to_string())
        );
        assert_eq!(extract_query_param("x=1", "api_key"), None);
        assert_eq!(extract_query_param("", "api_key"), None);
    }

    #[test]
    fn test_query_param_is_percent_decoded() {
        // 查询参数里的 key 与请求头里的同一个 key 必须等价
        assert_eq!(
            extract_query_param("api_key=ab%2Fcd%3D%3D", "api_key"),
            Some("ab/cd==".to_string())
        );
        assert_eq!(
            extract_query_param("api_key=a%20b&x=1", "api_key"),
            Some("a b".to_string())
        );
    }
}
