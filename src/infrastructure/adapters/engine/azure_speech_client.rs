//! Azure Speech REST 适配器
//!
//! 转写与发音评测走短语音识别 REST 接口，合成走 TTS REST 接口。
//! 流式识别用分段重识别模拟连续识别：音频帧在 worker 中累积，
//! 每累积一段就包上 WAV 头做一次部分识别

use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::application::ports::{
    EngineError, PronunciationAssessment, RecognitionEvent, SpeechEnginePort, StreamingRecognizer,
};
use crate::config::SpeechConfig;
use crate::domain::assessment::{PhonemeDetail, SpeechRate, WordDetail};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OUTPUT_FORMAT_HEADER: &str = "X-Microsoft-OutputFormat";
const ASSESSMENT_HEADER: &str = "Pronunciation-Assessment";
const TTS_OUTPUT_FORMAT: &str = "audio-24khz-96kbitrate-mono-mp3";

/// 流式分段识别的触发阈值（16kHz 16bit mono ≈ 2 秒）
const STREAM_CHUNK_BYTES: usize = 64 * 1024;

/// Azure Speech 客户端
pub struct AzureSpeechClient {
    http: reqwest::Client,
    key: String,
    region: String,
    endpoint: Option<String>,
    language: String,
}

impl AzureSpeechClient {
    pub fn new(config: &SpeechConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            key: config.key.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
        })
    }

    fn stt_url(&self) -> String {
        let base = match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.stt.speech.microsoft.com", self.region),
        };
        format!(
            "{}/speech/recognition/conversation/cognitiveservices/v1?language={}",
            base, self.language
        )
    }

    fn tts_url(&self) -> String {
        let base = match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.tts.speech.microsoft.com", self.region),
        };
        format!("{}/cognitiveservices/v1", base)
    }

    /// reqwest 错误映射到结构化引擎错误
    fn classify_request_error(err: reqwest::Error) -> EngineError {
        if err.is_timeout() {
            EngineError::Timeout
        } else if err.is_connect() {
            EngineError::Connection(err.to_string())
        } else if err.is_decode() {
            EngineError::InvalidResponse(err.to_string())
        } else {
            EngineError::Service(err.to_string())
        }
    }

    /// 非 2xx 状态映射：限流/过载是瞬时错误，其余致命
    async fn classify_status(response: reqwest::Response) -> EngineError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        {
            EngineError::Throttled(format!("HTTP {}: {}", status, body))
        } else {
            EngineError::Service(format!("HTTP {}: {}", status, body))
        }
    }

    async fn read_audio(&self, audio_path: &Path) -> Result<Vec<u8>, EngineError> {
        tokio::fs::read(audio_path)
            .await
            .map_err(|e| EngineError::Service(format!("Failed to read audio file: {}", e)))
    }

    async fn recognize_raw(
        &self,
        audio: Vec<u8>,
        assessment_params: Option<&str>,
        detailed: bool,
    ) -> Result<RecognitionResponse, EngineError> {
        let mut url = self.stt_url();
        if detailed {
            url.push_str("&format=detailed");
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            SUBSCRIPTION_KEY_HEADER,
            HeaderValue::from_str(&self.key)
                .map_err(|e| EngineError::Service(format!("Invalid subscription key: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("audio/wav; codecs=audio/pcm; samplerate=16000"),
        );
        if let Some(params) = assessment_params {
            let encoded = base64::engine::general_purpose::STANDARD.encode(params);
            headers.insert(
                ASSESSMENT_HEADER,
                HeaderValue::from_str(&encoded).map_err(|e| {
                    EngineError::Service(format!("Invalid assessment params: {}", e))
                })?,
            );
        }

        let response = self
            .http
            .post(&url)
            .headers(headers)
            .body(audio)
            .send()
            .await
            .map_err(Self::classify_request_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_status(response).await);
        }

        response
            .json::<RecognitionResponse>()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl SpeechEnginePort for AzureSpeechClient {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, EngineError> {
        let audio = self.read_audio(audio_path).await?;
        tracing::debug!(size = audio.len(), "Sending audio for transcription");

        let response = self.recognize_raw(audio, None, false).await?;
        if response.recognition_status != "Success" {
            return Err(EngineError::NoMatch(response.recognition_status));
        }
        response
            .display_text
            .ok_or_else(|| EngineError::InvalidResponse("Missing DisplayText".to_string()))
    }

    async fn assess_pronunciation(
        &self,
        audio_path: &Path,
        reference_text: &str,
    ) -> Result<PronunciationAssessment, EngineError> {
        let audio = self.read_audio(audio_path).await?;
        let params = serde_json::json!({
            "ReferenceText": reference_text,
            "GradingSystem": "HundredMark",
            "Granularity": "Phoneme",
            "Dimension": "Comprehensive",
            "EnableMiscue": true,
            "EnableProsodyAssessment": true,
        })
        .to_string();

        let started = Utc::now();
        let response = self.recognize_raw(audio, Some(&params), true).await?;
        let processing_time_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;

        if response.recognition_status != "Success" {
            return Err(EngineError::NoMatch(response.recognition_status));
        }

        let best = response
            .nbest
            .and_then(|mut nbest| {
                if nbest.is_empty() {
                    None
                } else {
                    Some(nbest.remove(0))
                }
            })
            .ok_or_else(|| EngineError::InvalidResponse("Empty NBest".to_string()))?;

        let transcription = best.display.clone().unwrap_or_default();
        // 音频时长优先取引擎返回的 Duration（100ns tick），缺失时退回处理耗时
        let duration_ms = response
            .duration_ticks
            .map(|ticks| ticks / 10_000)
            .filter(|ms| *ms > 0)
            .unwrap_or(processing_time_ms);
        let minutes = duration_ms as f64 / 60_000.0;
        let estimated_words_per_minute = if minutes > 0.0 {
            ((transcription.chars().count() as f64 / 2.0) / minutes).round() as u32
        } else {
            0
        };

        let words: Vec<WordDetail> = best
            .words
            .iter()
            .map(|word| WordDetail {
                word: word.word.clone(),
                accuracy_score: word
                    .assessment
                    .as_ref()
                    .map(|a| a.accuracy_score)
                    .unwrap_or(0.0),
                error_type: word
                    .assessment
                    .as_ref()
                    .and_then(|a| a.error_type.clone())
                    .filter(|t| t != "None"),
                stress_score: word.assessment.as_ref().and_then(|a| a.stress_score),
            })
            .collect();

        let phonemes: Vec<PhonemeDetail> = best
            .words
            .iter()
            .flat_map(|word| word.phonemes.iter())
            .map(|phoneme| PhonemeDetail {
                phoneme: phoneme.phoneme.clone(),
                accuracy_score: phoneme
                    .assessment
                    .as_ref()
                    .map(|a| a.accuracy_score)
                    .unwrap_or(0.0),
            })
            .collect();

        let scores = best
            .assessment
            .ok_or_else(|| EngineError::InvalidResponse("Missing PronunciationAssessment".to_string()))?;

        Ok(PronunciationAssessment {
            pronunciation_score: scores.pron_score.unwrap_or(0.0),
            accuracy_score: scores.accuracy_score,
            fluency_score: scores.fluency_score.unwrap_or(0.0),
            completeness_score: scores.completeness_score.unwrap_or(0.0),
            prosody_score: scores.prosody_score.unwrap_or(0.0),
            transcription,
            words,
            phonemes,
            speech_rate: SpeechRate {
                processing_time_ms,
                estimated_words_per_minute,
            },
        })
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_name: &str,
        output_path: &Path,
    ) -> Result<(), EngineError> {
        let ssml = build_ssml(&self.language, voice_name, text);

        let response = self
            .http
            .post(self.tts_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.key)
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header(OUTPUT_FORMAT_HEADER, TTS_OUTPUT_FORMAT)
            .body(ssml)
            .send()
            .await
            .map_err(Self::classify_request_error)?;

        if !response.status().is_success() {
            return Err(Self::classify_status(response).await);
        }

        let audio = response
            .bytes()
            .await
            .map_err(Self::classify_request_error)?;
        if audio.is_empty() {
            return Err(EngineError::InvalidResponse(
                "Engine returned empty audio".to_string(),
            ));
        }

        tokio::fs::write(output_path, &audio)
            .await
            .map_err(|e| EngineError::Service(format!("Failed to write audio file: {}", e)))?;
        tracing::debug!(size = audio.len(), path = %output_path.display(), "Synthesis complete");
        Ok(())
    }

    async fn open_stream(
        &self,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<Box<dyn StreamingRecognizer>, EngineError> {
        let (audio_tx, audio_rx) = mpsc::channel::<StreamCommand>(64);
        let worker = StreamWorker {
            http: self.http.clone(),
            key: self.key.clone(),
            url: self.stt_url(),
            events,
        };
        tokio::spawn(worker.run(audio_rx));
        Ok(Box::new(ChunkedRecognizer {
            commands: audio_tx,
            aborted: Arc::new(AtomicBool::new(false)),
        }))
    }
}

enum StreamCommand {
    Audio(Vec<u8>),
    Stop,
}

/// 分段重识别 worker
///
/// 没有持久的引擎流式连接：累积 PCM 帧，每满一段对到目前为止的
/// 全部音频做一次识别并发中间结果，stop 时做最终识别
struct StreamWorker {
    http: reqwest::Client,
    key: String,
    url: String,
    events: mpsc::Sender<RecognitionEvent>,
}

impl StreamWorker {
    async fn run(self, mut commands: mpsc::Receiver<StreamCommand>) {
        let session_start = Utc::now();
        let mut pcm: Vec<u8> = Vec::new();
        let mut last_partial_at = 0usize;

        while let Some(command) = commands.recv().await {
            match command {
                StreamCommand::Audio(chunk) => {
                    pcm.extend_from_slice(&chunk);
                    if pcm.len() - last_partial_at >= STREAM_CHUNK_BYTES {
                        last_partial_at = pcm.len();
                        match self.recognize(&pcm).await {
                            Ok(Some(text)) => {
                                let _ = self
                                    .events
                                    .send(RecognitionEvent::Recognizing { text })
                                    .await;
                            }
                            Ok(None) => {}
                            Err(err) => {
                                tracing::warn!(error = %err, "Partial recognition failed");
                                let _ = self
                                    .events
                                    .send(RecognitionEvent::Canceled {
                                        reason: err.to_string(),
                                    })
                                    .await;
                                return;
                            }
                        }
                    }
                }
                StreamCommand::Stop => {
                    if !pcm.is_empty() {
                        match self.recognize(&pcm).await {
                            Ok(Some(text)) => {
                                let duration_ms =
                                    (Utc::now() - session_start).num_milliseconds().max(0) as u64;
                                let _ = self
                                    .events
                                    .send(RecognitionEvent::Recognized {
                                        text,
                                        offset_ms: 0,
                                        duration_ms,
                                    })
                                    .await;
                            }
                            Ok(None) => {}
                            Err(err) => {
                                let _ = self
                                    .events
                                    .send(RecognitionEvent::Canceled {
                                        reason: err.to_string(),
                                    })
                                    .await;
                                return;
                            }
                        }
                    }
                    let _ = self.events.send(RecognitionEvent::Stopped).await;
                    return;
                }
            }
        }
        // 命令通道关闭（abort 或连接断开），不发 Stopped
    }

    async fn recognize(&self, pcm: &[u8]) -> Result<Option<String>, EngineError> {
        let wav = wrap_pcm_in_wav(pcm);
        let response = self
            .http
            .post(&self.url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.key)
            .header(ACCEPT, "application/json")
            .header(
                CONTENT_TYPE,
                "audio/wav; codecs=audio/pcm; samplerate=16000",
            )
            .body(wav)
            .send()
            .await
            .map_err(AzureSpeechClient::classify_request_error)?;

        if !response.status().is_success() {
            return Err(AzureSpeechClient::classify_status(response).await);
        }

        let parsed = response
            .json::<RecognitionResponse>()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;
        if parsed.recognition_status == "Success" {
            Ok(parsed.display_text)
        } else {
            Ok(None)
        }
    }
}

struct ChunkedRecognizer {
    commands: mpsc::Sender<StreamCommand>,
    aborted: Arc<AtomicBool>,
}

#[async_trait]
impl StreamingRecognizer for ChunkedRecognizer {
    async fn push_audio(&self, chunk: Vec<u8>) -> Result<(), EngineError> {
        if self.aborted.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.commands
            .send(StreamCommand::Audio(chunk))
            .await
            .map_err(|_| EngineError::Connection("Recognition worker gone".to_string()))
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.commands
            .send(StreamCommand::Stop)
            .await
            .map_err(|_| EngineError::Connection("Recognition worker gone".to_string()))
    }

    fn abort(&self) {
        // 丢弃发送端让 worker 的 recv 返回 None 即可终止，
        // 这里只拦住后续 push
        self.aborted.store(true, Ordering::SeqCst);
    }
}

/// 给裸 PCM（16kHz / 16bit / mono）加 WAV 头
fn wrap_pcm_in_wav(pcm: &[u8]) -> Vec<u8> {
    const SAMPLE_RATE: u32 = 16_000;
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;

    let byte_rate = SAMPLE_RATE * u32::from(CHANNELS) * u32::from(BITS_PER_SAMPLE) / 8;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let data_len = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

/// voice_name 与 text 都来自客户端，必须转义后才能进 SSML
fn build_ssml(language: &str, voice_name: &str, text: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='{lang}'><voice xml:lang='{lang}' name='{voice}'>{text}</voice></speak>",
        lang = language,
        voice = escape_xml(voice_name),
        text = escape_xml(text),
    )
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

// 引擎 wire 结构（PascalCase JSON）

#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    #[serde(rename = "RecognitionStatus")]
    recognition_status: String,
    #[serde(rename = "DisplayText")]
    display_text: Option<String>,
    #[serde(rename = "Duration")]
    duration_ticks: Option<u64>,
    #[serde(rename = "NBest")]
    nbest: Option<Vec<NBestEntry>>,
}

#[derive(Debug, Deserialize)]
struct NBestEntry {
    #[serde(rename = "Display")]
    display: Option<String>,
    #[serde(rename = "PronunciationAssessment")]
    assessment: Option<WireScores>,
    #[serde(rename = "Words", default)]
    words: Vec<WireWord>,
}

#[derive(Debug, Deserialize)]
struct WireScores {
    #[serde(rename = "AccuracyScore")]
    accuracy_score: f64,
    #[serde(rename = "FluencyScore")]
    fluency_score: Option<f64>,
    #[serde(rename = "CompletenessScore")]
    completeness_score: Option<f64>,
    #[serde(rename = "ProsodyScore")]
    prosody_score: Option<f64>,
    #[serde(rename = "PronScore")]
    pron_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireWord {
    #[serde(rename = "Word")]
    word: String,
    #[serde(rename = "PronunciationAssessment")]
    assessment: Option<WireWordScores>,
    #[serde(rename = "Phonemes", default)]
    phonemes: Vec<WirePhoneme>,
}

#[derive(Debug, Deserialize)]
struct WireWordScores {
    #[serde(rename = "AccuracyScore")]
    accuracy_score: f64,
    #[serde(rename = "ErrorType")]
    error_type: Option<String>,
    #[serde(rename = "StressScore")]
    stress_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WirePhoneme {
    #[serde(rename = "Phoneme")]
    phoneme: String,
    #[serde(rename = "PronunciationAssessment")]
    assessment: Option<WirePhonemeScores>,
}

#[derive(Debug, Deserialize)]
struct WirePhonemeScores {
    #[serde(rename = "AccuracyScore")]
    accuracy_score: f64,
}
