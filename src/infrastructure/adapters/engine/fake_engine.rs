//! 测试用假引擎
//!
//! 返回固定结果，可注入若干次瞬时/致命失败，并记录调用次数。
//! 单元测试与本地联调（无引擎凭据）共用

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::application::ports::{
    EngineError, PronunciationAssessment, RecognitionEvent, SpeechEnginePort, StreamingRecognizer,
};
use crate::domain::assessment::{PhonemeDetail, SpeechRate, WordDetail};

enum InjectedFailure {
    Transient,
    Fatal,
}

/// 假语音引擎
pub struct FakeSpeechEngine {
    transcription: String,
    assessment: PronunciationAssessment,
    failure_kind: Option<InjectedFailure>,
    remaining_failures: AtomicU32,
    transcribe_calls: AtomicU32,
    assess_calls: AtomicU32,
    synthesize_calls: AtomicU32,
}

impl FakeSpeechEngine {
    /// 固定的成功结果
    pub fn with_defaults() -> Self {
        Self {
            transcription: "こんにちは、元気です".to_string(),
            assessment: default_assessment(),
            failure_kind: None,
            remaining_failures: AtomicU32::new(0),
            transcribe_calls: AtomicU32::new(0),
            assess_calls: AtomicU32::new(0),
            synthesize_calls: AtomicU32::new(0),
        }
    }

    /// 前 count 次调用返回瞬时错误
    pub fn with_transient_failures(mut self, count: u32) -> Self {
        self.failure_kind = Some(InjectedFailure::Transient);
        self.remaining_failures = AtomicU32::new(count);
        self
    }

    /// 前 count 次调用返回致命错误
    pub fn with_fatal_failures(mut self, count: u32) -> Self {
        self.failure_kind = Some(InjectedFailure::Fatal);
        self.remaining_failures = AtomicU32::new(count);
        self
    }

    /// 替换默认评测结果
    pub fn with_assessment(mut self, assessment: PronunciationAssessment) -> Self {
        self.assessment = assessment;
        self
    }

    pub fn transcribe_calls(&self) -> u32 {
        self.transcribe_calls.load(Ordering::SeqCst)
    }

    pub fn assess_calls(&self) -> u32 {
        self.assess_calls.load(Ordering::SeqCst)
    }

    pub fn synthesize_calls(&self) -> u32 {
        self.synthesize_calls.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> Result<(), EngineError> {
        let kind = match &self.failure_kind {
            Some(kind) => kind,
            None => return Ok(()),
        };
        let consumed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !consumed {
            return Ok(());
        }
        match kind {
            InjectedFailure::Transient => Err(EngineError::Timeout),
            InjectedFailure::Fatal => Err(EngineError::Service("injected failure".to_string())),
        }
    }
}

fn default_assessment() -> PronunciationAssessment {
    PronunciationAssessment {
        pronunciation_score: 82.0,
        accuracy_score: 85.5,
        fluency_score: 78.0,
        completeness_score: 100.0,
        prosody_score: 75.0,
        transcription: "こんにちは、元気です".to_string(),
        words: vec![
            WordDetail {
                word: "こんにちは".to_string(),
                accuracy_score: 90.0,
                error_type: None,
                stress_score: Some(85.0),
            },
            WordDetail {
                word: "元気".to_string(),
                accuracy_score: 55.0,
                error_type: Some("Mispronunciation".to_string()),
                stress_score: Some(70.0),
            },
        ],
        phonemes: vec![
            PhonemeDetail {
                phoneme: "k".to_string(),
                accuracy_score: 92.0,
            },
            PhonemeDetail {
                phoneme: "o".to_string(),
                accuracy_score: 88.0,
            },
        ],
        speech_rate: SpeechRate {
            processing_time_ms: 2400,
            estimated_words_per_minute: 120,
        },
    }
}

#[async_trait]
impl SpeechEnginePort for FakeSpeechEngine {
    async fn transcribe(&self, _audio_path: &Path) -> Result<String, EngineError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        Ok(self.transcription.clone())
    }

    async fn assess_pronunciation(
        &self,
        _audio_path: &Path,
        _reference_text: &str,
    ) -> Result<PronunciationAssessment, EngineError> {
        self.assess_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        Ok(self.assessment.clone())
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_name: &str,
        output_path: &Path,
    ) -> Result<(), EngineError> {
        self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        // 确定性伪音频内容，便于断言缓存复制
        let payload = format!("ID3fake-audio:{}:{}", text, voice_name);
        tokio::fs::write(output_path, payload.as_bytes())
            .await
            .map_err(|e| EngineError::Service(e.to_string()))?;
        Ok(())
    }

    async fn open_stream(
        &self,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<Box<dyn StreamingRecognizer>, EngineError> {
        self.maybe_fail()?;
        Ok(Box::new(FakeRecognizer {
            events,
            buffered: Arc::new(Mutex::new(0)),
        }))
    }
}

/// 回显式假识别器：每帧发一个中间结果，stop 时发最终结果
struct FakeRecognizer {
    events: mpsc::Sender<RecognitionEvent>,
    buffered: Arc<Mutex<usize>>,
}

#[async_trait]
impl StreamingRecognizer for FakeRecognizer {
    async fn push_audio(&self, chunk: Vec<u8>) -> Result<(), EngineError> {
        let mut buffered = self.buffered.lock().await;
        *buffered += chunk.len();
        let _ = self
            .events
            .send(RecognitionEvent::Recognizing {
                text: format!("partial:{}", *buffered),
            })
            .await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), EngineError> {
        let _ = self
            .events
            .send(RecognitionEvent::Recognized {
                text: "こんにちは、元気です".to_string(),
                offset_ms: 0,
                duration_ms: 1200,
            })
            .await;
        let _ = self.events.send(RecognitionEvent::Stopped).await;
        Ok(())
    }

    fn abort(&self) {}
}
