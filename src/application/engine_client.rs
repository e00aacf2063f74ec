//! Retrying Engine Client - 引擎调用的重试 + 缓存包装
//!
//! 每次引擎调用先查结果缓存；miss 时带界定次数的重试调用引擎，
//! 只有结构化分类为瞬时的错误才重试，成功结果写回缓存

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::assessment::{derive_word_stress, StressAnalysis};

use super::ports::{
    assessment_fingerprint, stress_fingerprint, synthesis_fingerprint, transcription_fingerprint,
    AudioAsset, CachedResult, EngineError, PronunciationAssessment, ResultCachePort,
    SpeechEnginePort,
};

/// 重试引擎客户端配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 两次尝试之间的固定间隔
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// 重试引擎客户端
///
/// 包装 SpeechEnginePort，提供缓存与瞬时错误重试
pub struct RetryingEngineClient {
    engine: Arc<dyn SpeechEnginePort>,
    cache: Arc<dyn ResultCachePort>,
    policy: RetryPolicy,
    cache_ttl: Duration,
}

impl RetryingEngineClient {
    pub fn new(
        engine: Arc<dyn SpeechEnginePort>,
        cache: Arc<dyn ResultCachePort>,
        policy: RetryPolicy,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            engine,
            cache,
            policy,
            cache_ttl,
        }
    }

    /// 带重试地执行一次引擎操作
    ///
    /// 瞬时错误最多重试到 max_attempts 次，固定间隔；
    /// 致命错误在首次出现时立即传播
    async fn call_with_retry<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, EngineError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut attempt = 1u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.policy.max_attempts => {
                    tracing::warn!(
                        operation = operation,
                        attempt = attempt,
                        error = %err,
                        "Transient engine error, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(
                        operation = operation,
                        attempts = attempt,
                        error = %err,
                        "Engine call failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// 转写音频
    pub async fn transcribe(&self, asset: &AudioAsset) -> Result<String, EngineError> {
        let fingerprint = transcription_fingerprint(&asset.content_hash);
        if let Some(CachedResult::Transcription(text)) = self.cache.get(&fingerprint) {
            tracing::debug!(fingerprint = %fingerprint, "Cache hit for transcription");
            return Ok(text);
        }

        let path = asset.path.clone();
        let text = self
            .call_with_retry("transcribe", || self.engine.transcribe(&path))
            .await?;

        self.cache.put(
            fingerprint,
            CachedResult::Transcription(text.clone()),
            self.cache_ttl,
        );
        Ok(text)
    }

    /// 发音评测
    pub async fn assess_pronunciation(
        &self,
        asset: &AudioAsset,
        reference_text: &str,
    ) -> Result<PronunciationAssessment, EngineError> {
        let fingerprint = assessment_fingerprint(&asset.content_hash, reference_text);
        if let Some(CachedResult::Assessment(result)) = self.cache.get(&fingerprint) {
            tracing::debug!(fingerprint = %fingerprint, "Cache hit for pronunciation assessment");
            return Ok(result);
        }

        let path = asset.path.clone();
        let result = self
            .call_with_retry("assess_pronunciation", || {
                self.engine.assess_pronunciation(&path, reference_text)
            })
            .await?;

        self.cache.put(
            fingerprint,
            CachedResult::Assessment(result.clone()),
            self.cache_ttl,
        );
        Ok(result)
    }

    /// 重音分析
    ///
    /// 引擎没有独立的重音操作：结果由（已缓存的）发音评测的
    /// 单词级重音分数推导，并以独立指纹缓存
    pub async fn analyze_word_stress(
        &self,
        asset: &AudioAsset,
        reference_text: &str,
    ) -> Result<StressAnalysis, EngineError> {
        let fingerprint = stress_fingerprint(&asset.content_hash, reference_text);
        if let Some(CachedResult::Stress(result)) = self.cache.get(&fingerprint) {
            tracing::debug!(fingerprint = %fingerprint, "Cache hit for word stress analysis");
            return Ok(result);
        }

        let assessment = self.assess_pronunciation(asset, reference_text).await?;
        let stress = derive_word_stress(&assessment.words);

        self.cache.put(
            fingerprint,
            CachedResult::Stress(stress.clone()),
            self.cache_ttl,
        );
        Ok(stress)
    }

    /// 语音合成
    ///
    /// 合成音频由引擎直接写入文件 sink，因此缓存存的是
    /// 可复制的制品路径；命中时把制品复制到调用方的输出位置。
    /// 制品可能已被清扫删除，此时按 miss 处理
    pub async fn synthesize(
        &self,
        text: &str,
        voice_name: &str,
        output_path: &Path,
    ) -> Result<(), EngineError> {
        let fingerprint = synthesis_fingerprint(text, voice_name);

        if let Some(CachedResult::SynthesisArtifact(artifact)) = self.cache.get(&fingerprint) {
            if artifact.exists() {
                match tokio::fs::copy(&artifact, output_path).await {
                    Ok(_) => {
                        tracing::debug!(fingerprint = %fingerprint, "Cache hit for synthesis");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::warn!(
                            artifact = %artifact.display(),
                            error = %e,
                            "Failed to copy cached synthesis artifact, falling back to engine"
                        );
                    }
                }
            }
        }

        self.call_with_retry("synthesize", || {
            self.engine.synthesize(text, voice_name, output_path)
        })
        .await?;

        // 输出文件属于调用方且随请求结束删除，复制一份作为缓存制品
        let artifact = self.artifact_path(output_path, &fingerprint);
        match tokio::fs::copy(output_path, &artifact).await {
            Ok(_) => {
                self.cache.put(
                    fingerprint,
                    CachedResult::SynthesisArtifact(artifact),
                    self.cache_ttl,
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to store synthesis artifact, skipping cache");
            }
        }

        Ok(())
    }

    /// 制品与输出文件同目录，文件名含指纹保证唯一
    fn artifact_path(&self, output_path: &Path, fingerprint: &str) -> PathBuf {
        let extension = output_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3");
        let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
        dir.join(format!("{}.{}", fingerprint, extension))
    }
}
