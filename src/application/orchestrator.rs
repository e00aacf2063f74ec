//! Assessment Orchestrator - 评测编排
//!
//! 对一次评测请求发起并发的引擎调用（评测/转写/重音），
//! 合并结果并派生 JLPT 等级、基准差值、语速评级与优劣势报告

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::assessment::{
    analyze_strengths_weaknesses, derive_word_stress, AnalysisReport, AssessmentMode, JlptLevel,
    PhonemeDetail, PronunciationScores, SpeechRateAssessment, StressAnalysis, WordDetail,
};

use super::engine_client::RetryingEngineClient;
use super::error::ApplicationError;
use super::ports::AudioAsset;

/// 评分基准线
const BENCHMARK: f64 = 80.0;

/// 双通道转写（独立识别 + 评测附带）
#[derive(Debug, Clone, Serialize)]
pub struct Transcription {
    pub from_recognition: String,
    pub from_assessment: String,
}

/// 语速部分
#[derive(Debug, Clone, Serialize)]
pub struct SpeechRateReport {
    pub words_per_minute: u32,
    pub assessment: SpeechRateAssessment,
}

/// 重音部分
#[derive(Debug, Clone, Serialize)]
pub struct WordStressReport {
    pub overall_score: f64,
    pub details: Vec<crate::domain::assessment::WordStressDetail>,
}

/// 与基准线的差值（仅 Reading 模式）
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkComparison {
    pub accuracy_vs_benchmark: f64,
    pub fluency_vs_benchmark: f64,
    pub overall_vs_benchmark: f64,
}

/// 完整评测结果（即响应体形状）
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentOutcome {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_text: Option<String>,
    pub assessment_mode: AssessmentMode,
    pub transcription: Transcription,
    pub jlpt_level: JlptLevel,
    pub pronunciation_scores: PronunciationScores,
    pub speech_rate: SpeechRateReport,
    pub word_stress: WordStressReport,
    pub analysis: AnalysisReport,
    pub word_details: Vec<WordDetail>,
    pub phoneme_details: Vec<PhonemeDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark_comparison: Option<BenchmarkComparison>,
    pub timestamp: String,
}

/// 评测编排器
pub struct AssessmentOrchestrator {
    client: Arc<RetryingEngineClient>,
}

impl AssessmentOrchestrator {
    pub fn new(client: Arc<RetryingEngineClient>) -> Self {
        Self { client }
    }

    /// 执行一次完整评测
    ///
    /// Reading 模式发 3 路并发引擎调用，Speaking 模式发 2 路并从
    /// 评测结果本地推导重音。全有或全无：任一调用失败整个请求失败，
    /// 其余在途调用不主动取消，完成后的结果被丢弃
    pub async fn assess(
        &self,
        asset: &AudioAsset,
        reference_text: Option<&str>,
        user_id: &str,
    ) -> Result<AssessmentOutcome, ApplicationError> {
        let mode = AssessmentMode::from_reference_text(reference_text);

        tracing::info!(
            user_id = %user_id,
            mode = ?mode,
            audio_size = asset.size_bytes,
            "Running pronunciation assessment"
        );

        let (assessment, recognized_text, stress) = match mode {
            AssessmentMode::Reading => {
                let reference = reference_text.unwrap_or_default();
                tokio::try_join!(
                    self.client.assess_pronunciation(asset, reference),
                    self.client.transcribe(asset),
                    self.client.analyze_word_stress(asset, reference),
                )?
            }
            AssessmentMode::Speaking => {
                let (assessment, recognized_text) = tokio::try_join!(
                    self.client.assess_pronunciation(asset, ""),
                    self.client.transcribe(asset),
                )?;
                let stress = derive_word_stress(&assessment.words);
                (assessment, recognized_text, stress)
            }
        };

        Ok(self.merge(mode, assessment, recognized_text, stress, reference_text, user_id))
    }

    /// 合并引擎结果并派生次级指标
    fn merge(
        &self,
        mode: AssessmentMode,
        assessment: crate::application::ports::PronunciationAssessment,
        recognized_text: String,
        stress: StressAnalysis,
        reference_text: Option<&str>,
        user_id: &str,
    ) -> AssessmentOutcome {
        // completeness 仅在 Reading 模式下有意义
        let scores = PronunciationScores {
            accuracy: assessment.accuracy_score,
            fluency: assessment.fluency_score,
            completeness: mode
                .is_reading()
                .then_some(assessment.completeness_score),
            pronunciation: assessment.pronunciation_score,
            prosody: assessment.prosody_score,
        };

        let jlpt_level = JlptLevel::from_pronunciation_score(scores.pronunciation);
        let words_per_minute = assessment.speech_rate.estimated_words_per_minute;
        let analysis = analyze_strengths_weaknesses(&scores, &assessment.words);

        let benchmark_comparison = mode.is_reading().then(|| BenchmarkComparison {
            accuracy_vs_benchmark: round2(scores.accuracy - BENCHMARK),
            fluency_vs_benchmark: round2(scores.fluency - BENCHMARK),
            overall_vs_benchmark: round2(scores.pronunciation - BENCHMARK),
        });

        AssessmentOutcome {
            user_id: user_id.to_string(),
            reference_text: mode
                .is_reading()
                .then(|| reference_text.unwrap_or_default().to_string()),
            assessment_mode: mode,
            transcription: Transcription {
                from_recognition: recognized_text,
                from_assessment: assessment.transcription,
            },
            jlpt_level,
            pronunciation_scores: scores,
            speech_rate: SpeechRateReport {
                words_per_minute,
                assessment: SpeechRateAssessment::from_words_per_minute(words_per_minute),
            },
            word_stress: WordStressReport {
                overall_score: stress.overall_stress_score,
                details: stress.details,
            },
            analysis,
            word_details: assessment.words,
            phoneme_details: assessment.phonemes,
            benchmark_comparison,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// 保留两位小数
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine_client::RetryPolicy;
    use crate::infrastructure::adapters::engine::FakeSpeechEngine;
    use crate::infrastructure::memory::InMemoryResultCache;
    use std::path::Path;
    use std::time::Duration;
    use uuid::Uuid;

    fn test_asset(dir: &Path) -> AudioAsset {
        let bytes = b"RIFFdata";
        let path = dir.join("audio-test.wav");
        std::fs::write(&path, bytes).unwrap();
        AudioAsset {
            id: Uuid::new_v4(),
            path,
            size_bytes: bytes.len() as u64,
            extension: "wav".to_string(),
            mime_type: "audio/wav",
            content_hash: format!("{:x}", md5::compute(bytes)),
            created_at: Utc::now(),
        }
    }

    fn orchestrator(engine: Arc<FakeSpeechEngine>) -> AssessmentOrchestrator {
        let client = Arc::new(RetryingEngineClient::new(
            engine,
            Arc::new(InMemoryResultCache::new()),
            RetryPolicy {
                max_attempts: 3,
                delay: Duration::from_millis(1),
            },
            Duration::from_secs(300),
        ));
        AssessmentOrchestrator::new(client)
    }

    #[tokio::test]
    async fn test_reading_mode_has_completeness_and_benchmark() {
        let dir = tempfile::tempdir().unwrap();
        let asset = test_asset(dir.path());
        let orchestrator = orchestrator(Arc::new(FakeSpeechEngine::with_defaults()));

        let outcome = orchestrator
            .assess(&asset, Some("こんにちは"), "user-1")
            .await
            .unwrap();

        assert_eq!(outcome.assessment_mode, AssessmentMode::Reading);
        assert!(outcome.pronunciation_scores.completeness.is_some());
        assert!(outcome.benchmark_comparison.is_some());
        assert_eq!(outcome.reference_text.as_deref(), Some("こんにちは"));
    }

    #[tokio::test]
    async fn test_speaking_mode_has_no_completeness_nor_benchmark() {
        let dir = tempfile::tempdir().unwrap();
        let asset = test_asset(dir.path());
        let orchestrator = orchestrator(Arc::new(FakeSpeechEngine::with_defaults()));

        let outcome = orchestrator.assess(&asset, None, "user-1").await.unwrap();

        assert_eq!(outcome.assessment_mode, AssessmentMode::Speaking);
        assert!(outcome.pronunciation_scores.completeness.is_none());
        assert!(outcome.benchmark_comparison.is_none());
        assert!(outcome.reference_text.is_none());
    }

    #[tokio::test]
    async fn test_whitespace_reference_is_speaking() {
        let dir = tempfile::tempdir().unwrap();
        let asset = test_asset(dir.path());
        let orchestrator = orchestrator(Arc::new(FakeSpeechEngine::with_defaults()));

        let outcome = orchestrator
            .assess(&asset, Some("   "), "user-1")
            .await
            .unwrap();
        assert_eq!(outcome.assessment_mode, AssessmentMode::Speaking);
    }

    #[tokio::test]
    async fn test_speaking_mode_serializes_completeness_null() {
        let dir = tempfile::tempdir().unwrap();
        let asset = test_asset(dir.path());
        let orchestrator = orchestrator(Arc::new(FakeSpeechEngine::with_defaults()));

        let outcome = orchestrator.assess(&asset, None, "user-1").await.unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json["pronunciation_scores"]["completeness"].is_null());
        assert!(json.get("benchmark_comparison").is_none());
        assert_eq!(json["assessment_mode"], "Speaking");
    }

    #[tokio::test]
    async fn test_engine_failure_fails_whole_request() {
        let dir = tempfile::tempdir().unwrap();
        let asset = test_asset(dir.path());
        let orchestrator =
            orchestrator(Arc::new(FakeSpeechEngine::with_defaults().with_fatal_failures(1)));

        let result = orchestrator.assess(&asset, Some("こんにちは"), "user-1").await;
        assert!(matches!(result, Err(ApplicationError::Engine(_))));
    }

    #[tokio::test]
    async fn test_benchmark_deltas_rounded() {
        let dir = tempfile::tempdir().unwrap();
        let asset = test_asset(dir.path());
        let engine = FakeSpeechEngine::with_defaults();
        let orchestrator = orchestrator(Arc::new(engine));

        let outcome = orchestrator
            .assess(&asset, Some("こんにちは"), "user-1")
            .await
            .unwrap();
        let benchmark = outcome.benchmark_comparison.unwrap();
        // 默认评测分 accuracy=85.5 → 5.5
        assert_eq!(benchmark.accuracy_vs_benchmark, 5.5);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(5.555), 5.56);
        assert_eq!(round2(-2.004), -2.0);
        assert_eq!(round2(0.0), 0.0);
    }
}
