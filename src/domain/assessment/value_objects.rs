//! Assessment Value Objects - 评测值对象

use serde::{Deserialize, Serialize};

/// 评测模式
///
/// Reading: 有参考文本，对照朗读
/// Speaking: 无参考文本，自由表达
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentMode {
    Reading,
    Speaking,
}

impl AssessmentMode {
    /// 根据参考文本推导评测模式
    ///
    /// 去除首尾空白后非空即为 Reading
    pub fn from_reference_text(reference_text: Option<&str>) -> Self {
        match reference_text {
            Some(text) if !text.trim().is_empty() => AssessmentMode::Reading,
            _ => AssessmentMode::Speaking,
        }
    }

    pub fn is_reading(&self) -> bool {
        matches!(self, AssessmentMode::Reading)
    }
}

/// JLPT 等级（N1 最高，N5 最低）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JlptLevel {
    N1,
    N2,
    N3,
    N4,
    N5,
}

impl JlptLevel {
    /// 根据发音总分确定 JLPT 等级
    pub fn from_pronunciation_score(score: f64) -> Self {
        if score >= 90.0 {
            JlptLevel::N1
        } else if score >= 80.0 {
            JlptLevel::N2
        } else if score >= 70.0 {
            JlptLevel::N3
        } else if score >= 60.0 {
            JlptLevel::N4
        } else {
            JlptLevel::N5
        }
    }
}

/// 语速评级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechRateRating {
    Slow,
    Good,
    Fast,
}

/// 语速评估（评级 + 固定反馈文案）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRateAssessment {
    pub rating: SpeechRateRating,
    pub feedback: String,
}

impl SpeechRateAssessment {
    /// 根据每分钟词数评估语速
    ///
    /// 日语自然语速约 100-150 词/分钟
    pub fn from_words_per_minute(words_per_minute: u32) -> Self {
        if words_per_minute < 80 {
            Self {
                rating: SpeechRateRating::Slow,
                feedback: "Speaking rate is a little slow. Slow speech can help clarity, \
                           but try to speed up towards a natural pace."
                    .to_string(),
            }
        } else if words_per_minute <= 150 {
            Self {
                rating: SpeechRateRating::Good,
                feedback: "Speaking rate is appropriate, close to the natural pace of a \
                           native speaker."
                    .to_string(),
            }
        } else {
            Self {
                rating: SpeechRateRating::Fast,
                feedback: "Speaking rate is a little fast. Fast speech can hurt clarity, \
                           so slow down for clearer pronunciation."
                    .to_string(),
            }
        }
    }
}

/// 发音评测分数集合
///
/// completeness 仅在 Reading 模式下有值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PronunciationScores {
    pub accuracy: f64,
    pub fluency: f64,
    pub completeness: Option<f64>,
    pub pronunciation: f64,
    pub prosody: f64,
}

/// 单词级评测明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordDetail {
    pub word: String,
    pub accuracy_score: f64,
    /// 错误标签，如 "Mispronunciation" / "Omission"
    pub error_type: Option<String>,
    /// 重音分数，引擎未提供时为 None
    pub stress_score: Option<f64>,
}

/// 音素级评测明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhonemeDetail {
    pub phoneme: String,
    pub accuracy_score: f64,
}

/// 语速估计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRate {
    pub processing_time_ms: u64,
    pub estimated_words_per_minute: u32,
}

/// 重音分析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressAnalysis {
    pub overall_stress_score: f64,
    pub details: Vec<WordStressDetail>,
}

/// 单词重音明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordStressDetail {
    pub word: String,
    pub stress_score: f64,
    pub is_correctly_stressed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_reading_iff_reference_text_non_empty() {
        assert_eq!(
            AssessmentMode::from_reference_text(Some("こんにちは")),
            AssessmentMode::Reading
        );
        assert_eq!(
            AssessmentMode::from_reference_text(Some("  ")),
            AssessmentMode::Speaking
        );
        assert_eq!(
            AssessmentMode::from_reference_text(Some("")),
            AssessmentMode::Speaking
        );
        assert_eq!(
            AssessmentMode::from_reference_text(None),
            AssessmentMode::Speaking
        );
    }

    #[test]
    fn test_jlpt_buckets() {
        assert_eq!(JlptLevel::from_pronunciation_score(95.0), JlptLevel::N1);
        assert_eq!(JlptLevel::from_pronunciation_score(85.0), JlptLevel::N2);
        assert_eq!(JlptLevel::from_pronunciation_score(75.0), JlptLevel::N3);
        assert_eq!(JlptLevel::from_pronunciation_score(65.0), JlptLevel::N4);
        assert_eq!(JlptLevel::from_pronunciation_score(50.0), JlptLevel::N5);
    }

    #[test]
    fn test_jlpt_boundary_values() {
        assert_eq!(JlptLevel::from_pronunciation_score(90.0), JlptLevel::N1);
        assert_eq!(JlptLevel::from_pronunciation_score(80.0), JlptLevel::N2);
        assert_eq!(JlptLevel::from_pronunciation_score(70.0), JlptLevel::N3);
        assert_eq!(JlptLevel::from_pronunciation_score(60.0), JlptLevel::N4);
    }

    #[test]
    fn test_speech_rate_boundaries() {
        assert_eq!(
            SpeechRateAssessment::from_words_per_minute(79).rating,
            SpeechRateRating::Slow
        );
        assert_eq!(
            SpeechRateAssessment::from_words_per_minute(80).rating,
            SpeechRateRating::Good
        );
        assert_eq!(
            SpeechRateAssessment::from_words_per_minute(150).rating,
            SpeechRateRating::Good
        );
        assert_eq!(
            SpeechRateAssessment::from_words_per_minute(151).rating,
            SpeechRateRating::Fast
        );
    }

    #[test]
    fn test_rating_serializes_lowercase() {
        let assessment = SpeechRateAssessment::from_words_per_minute(100);
        let json = serde_json::to_value(&assessment).unwrap();
        assert_eq!(json["rating"], "good");
    }
}
