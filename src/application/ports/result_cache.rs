//! Result Cache Port - 内容寻址结果缓存
//!
//! key 为操作类型 + 音频内容哈希 + 辅助文本组成的确定性指纹，
//! 条目写入后不可变，覆盖写入无害

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::assessment::StressAnalysis;

use super::speech_engine::PronunciationAssessment;

/// 缓存值
#[derive(Debug, Clone)]
pub enum CachedResult {
    /// 转写文本
    Transcription(String),
    /// 发音评测结果
    Assessment(PronunciationAssessment),
    /// 重音分析结果
    Stress(StressAnalysis),
    /// 合成音频制品的路径（命中时复制到调用方指定的输出位置）
    SynthesisArtifact(PathBuf),
}

/// Result Cache Port
///
/// 任意数量的并发请求可无锁读写（幂等覆盖）；
/// 并发的相同 miss 不做去重合并
pub trait ResultCachePort: Send + Sync {
    /// 按指纹查找，过期即 miss
    fn get(&self, fingerprint: &str) -> Option<CachedResult>;

    /// 写入结果，覆盖已有条目
    fn put(&self, fingerprint: String, value: CachedResult, ttl: Duration);
}

/// 转写操作指纹
pub fn transcription_fingerprint(content_hash: &str) -> String {
    format!("stt_{}", content_hash)
}

/// 发音评测操作指纹
pub fn assessment_fingerprint(content_hash: &str, reference_text: &str) -> String {
    format!(
        "pron_{}_{:x}",
        content_hash,
        md5::compute(reference_text.as_bytes())
    )
}

/// 重音分析操作指纹
pub fn stress_fingerprint(content_hash: &str, reference_text: &str) -> String {
    format!(
        "stress_{}_{:x}",
        content_hash,
        md5::compute(reference_text.as_bytes())
    )
}

/// 合成操作指纹（基于文本 + 音色）
pub fn synthesis_fingerprint(text: &str, voice_name: &str) -> String {
    format!(
        "tts_{:x}",
        md5::compute(format!("{}|{}", text, voice_name).as_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprints_are_deterministic() {
        assert_eq!(
            assessment_fingerprint("abc", "こんにちは"),
            assessment_fingerprint("abc", "こんにちは")
        );
        assert_eq!(
            synthesis_fingerprint("text", "ja-JP-NanamiNeural"),
            synthesis_fingerprint("text", "ja-JP-NanamiNeural")
        );
    }

    #[test]
    fn test_fingerprints_distinguish_operation_and_inputs() {
        let fp_stt = transcription_fingerprint("abc");
        let fp_pron = assessment_fingerprint("abc", "x");
        let fp_stress = stress_fingerprint("abc", "x");
        assert_ne!(fp_stt, fp_pron);
        assert_ne!(fp_pron, fp_stress);
        assert_ne!(
            assessment_fingerprint("abc", "x"),
            assessment_fingerprint("abc", "y")
        );
        assert_ne!(
            synthesis_fingerprint("a", "voice1"),
            synthesis_fingerprint("a", "voice2")
        );
    }
}
