//! Speech Engine Port - 外部语音引擎抽象
//!
//! 转写、发音评测、语音合成与流式识别四种操作，
//! 全部视为不透明的远程调用

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::assessment::{PhonemeDetail, SpeechRate, WordDetail};

/// 语音引擎错误
///
/// 瞬时/致命由结构化变体区分，不做字符串匹配
#[derive(Debug, Error)]
pub enum EngineError {
    /// 请求超时（瞬时）
    #[error("Engine request timeout")]
    Timeout,

    /// 网络层错误：连接被拒/重置、DNS 失败等（瞬时）
    #[error("Engine connection error: {0}")]
    Connection(String),

    /// 引擎限流或服务繁忙（瞬时）
    #[error("Engine throttled: {0}")]
    Throttled(String),

    /// 引擎业务错误（致命，立即传播）
    #[error("Engine service error: {0}")]
    Service(String),

    /// 响应无法解析（致命）
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    /// 未能识别出语音（致命）
    #[error("No speech recognized: {0}")]
    NoMatch(String),
}

impl EngineError {
    /// 瞬时错误可以重试，其余立即传播
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout | EngineError::Connection(_) | EngineError::Throttled(_)
        )
    }
}

/// 发音评测结果（引擎原始输出，分数视为不透明浮点）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PronunciationAssessment {
    pub pronunciation_score: f64,
    pub accuracy_score: f64,
    pub fluency_score: f64,
    pub completeness_score: f64,
    pub prosody_score: f64,
    pub transcription: String,
    pub words: Vec<WordDetail>,
    pub phonemes: Vec<PhonemeDetail>,
    pub speech_rate: SpeechRate,
}

/// 流式识别事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecognitionEvent {
    /// 中间结果
    Recognizing { text: String },
    /// 最终结果
    Recognized {
        text: String,
        offset_ms: u64,
        duration_ms: u64,
    },
    /// 识别被取消（引擎侧错误以事件形式上报）
    Canceled { reason: String },
    /// 识别会话已结束
    Stopped,
}

/// 流式识别句柄：一个音频 sink + 生命周期控制
#[async_trait]
pub trait StreamingRecognizer: Send + Sync {
    /// 按接收顺序推送原始音频帧
    async fn push_audio(&self, chunk: Vec<u8>) -> Result<(), EngineError>;

    /// 请求结束连续识别，等待引擎完成回调
    async fn stop(&self) -> Result<(), EngineError>;

    /// 立即放弃识别，不等待完成（连接断开时使用）
    fn abort(&self);
}

/// Speech Engine Port
///
/// 外部语音引擎的抽象接口
#[async_trait]
pub trait SpeechEnginePort: Send + Sync {
    /// 转写音频文件为文本
    async fn transcribe(&self, audio_path: &Path) -> Result<String, EngineError>;

    /// 发音评测
    ///
    /// Speaking 模式下 reference_text 传空串
    async fn assess_pronunciation(
        &self,
        audio_path: &Path,
        reference_text: &str,
    ) -> Result<PronunciationAssessment, EngineError>;

    /// 语音合成，音频直接写入 output_path
    async fn synthesize(
        &self,
        text: &str,
        voice_name: &str,
        output_path: &Path,
    ) -> Result<(), EngineError>;

    /// 打开流式识别会话
    ///
    /// 识别事件通过 events 通道回传
    async fn open_stream(
        &self,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<Box<dyn StreamingRecognizer>, EngineError>;
}
