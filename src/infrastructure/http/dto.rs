//! 请求/响应 DTO 与音频请求解析
//!
//! 音频类接口同时接受 multipart（字段 audio）与 JSON base64 两种载荷

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use base64::Engine as _;
use serde::Deserialize;

use super::error::ApiError;

/// JSON 载荷的音频请求
#[derive(Debug, Deserialize)]
struct AudioJsonBody {
    /// base64 编码的音频数据
    audio: String,
    /// 音频格式扩展名，缺省 wav
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    reference_text: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

/// 统一后的音频请求
#[derive(Debug)]
pub struct AudioRequest {
    pub audio: Vec<u8>,
    pub extension: String,
    pub reference_text: Option<String>,
    pub user_id: Option<String>,
}

impl AudioRequest {
    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or("anonymous")
    }
}

/// 语音合成请求
#[derive(Debug, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(default)]
    pub voice_name: Option<String>,
}

/// 意图识别的 JSON 文本载荷
#[derive(Debug, Deserialize)]
pub struct IntentTextBody {
    pub text: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// 解析 multipart 或 JSON base64 的音频请求
pub async fn parse_audio_request(
    request: Request,
    max_size: usize,
) -> Result<AudioRequest, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?;
        parse_multipart(multipart).await
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), max_size)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {}", e)))?;
        parse_audio_json(&bytes)
    }
}

/// 解析 JSON base64 音频载荷
pub fn parse_audio_json(bytes: &[u8]) -> Result<AudioRequest, ApiError> {
    let body: AudioJsonBody = serde_json::from_slice(bytes)
        .map_err(|e| ApiError::bad_request(format!("Malformed JSON body: {}", e)))?;
    let audio = base64::engine::general_purpose::STANDARD
        .decode(body.audio.as_bytes())
        .map_err(|_| ApiError::bad_request("Field 'audio' is not valid base64"))?;
    Ok(AudioRequest {
        audio,
        extension: body.format.unwrap_or_else(|| "wav".to_string()),
        reference_text: body.reference_text,
        user_id: body.user_id,
    })
}

async fn parse_multipart(mut multipart: Multipart) -> Result<AudioRequest, ApiError> {
    let mut audio: Option<Vec<u8>> = None;
    let mut extension: Option<String> = None;
    let mut reference_text: Option<String> = None;
    let mut user_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("audio") => {
                extension = field
                    .file_name()
                    .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_string()));
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read audio field: {}", e)))?;
                audio = Some(bytes.to_vec());
            }
            Some("reference_text") => {
                reference_text = Some(read_text_field(field).await?);
            }
            Some("user_id") => {
                user_id = Some(read_text_field(field).await?);
            }
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| ApiError::bad_request("Missing 'audio' field"))?;
    Ok(AudioRequest {
        audio,
        extension: extension.unwrap_or_else(|| "wav".to_string()),
        reference_text,
        user_id,
    })
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read text field: {}", e)))
}
