//! Assessment Analysis - 评测结果分析
//!
//! 优劣势分析与重音推导，均为纯函数

use serde::{Deserialize, Serialize};

use super::value_objects::{PronunciationScores, StressAnalysis, WordDetail, WordStressDetail};

/// 优劣势分析报告
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvement_suggestions: Vec<String>,
}

/// 分数 >= 80 计为优势
const STRENGTH_THRESHOLD: f64 = 80.0;
/// 分数 < 60 计为劣势，60-79 不输出
const WEAKNESS_THRESHOLD: f64 = 60.0;

/// 分析各维度分数，输出优势、劣势与改进建议
///
/// completeness 为 None（Speaking 模式）时跳过该维度
pub fn analyze_strengths_weaknesses(
    scores: &PronunciationScores,
    words: &[WordDetail],
) -> AnalysisReport {
    let mut report = AnalysisReport::default();

    if scores.accuracy >= STRENGTH_THRESHOLD {
        report
            .strengths
            .push("Accurate pronunciation of vocabulary".to_string());
    } else if scores.accuracy < WEAKNESS_THRESHOLD {
        report
            .weaknesses
            .push("Low pronunciation accuracy".to_string());
        report.improvement_suggestions.push(
            "Practice pronouncing individual words before attempting full sentences".to_string(),
        );
    }

    if scores.fluency >= STRENGTH_THRESHOLD {
        report
            .strengths
            .push("Fluent speech with few interruptions".to_string());
    } else if scores.fluency < WEAKNESS_THRESHOLD {
        report
            .weaknesses
            .push("Speech is not yet fluent, with frequent pauses".to_string());
        report.improvement_suggestions.push(
            "Practice speaking without pausing and read long sentences aloud".to_string(),
        );
    }

    if let Some(completeness) = scores.completeness {
        if completeness >= STRENGTH_THRESHOLD {
            report
                .strengths
                .push("Covered the full content of the reference text".to_string());
        } else if completeness < WEAKNESS_THRESHOLD {
            report
                .weaknesses
                .push("Did not cover the full content of the reference text".to_string());
            report.improvement_suggestions.push(
                "Read and memorize the entire text before speaking".to_string(),
            );
        }
    }

    if scores.prosody >= STRENGTH_THRESHOLD {
        report
            .strengths
            .push("Natural, native-like intonation".to_string());
    } else if scores.prosody < WEAKNESS_THRESHOLD {
        report
            .weaknesses
            .push("Intonation is flat and unnatural".to_string());
        report.improvement_suggestions.push(
            "Listen to and imitate native speakers, focusing on pitch and stress".to_string(),
        );
    }

    // 发音困难的单词单独列为一条劣势
    let problematic: Vec<&str> = words
        .iter()
        .filter(|w| w.accuracy_score < WEAKNESS_THRESHOLD)
        .map(|w| w.word.as_str())
        .collect();
    if !problematic.is_empty() {
        report.weaknesses.push(format!(
            "Difficulty pronouncing the words: {}",
            problematic.join(", ")
        ));
        report.improvement_suggestions.push(
            "Practice these difficult words with the help of a pronunciation dictionary"
                .to_string(),
        );
    }

    report
}

/// 从单词级重音分数推导整体重音分析
///
/// 取非空重音分数的平均值；分数 >= 80 视为重音正确
pub fn derive_word_stress(words: &[WordDetail]) -> StressAnalysis {
    let mut total = 0.0;
    let mut count = 0u32;
    let mut details = Vec::new();

    for word in words {
        if let Some(stress_score) = word.stress_score {
            total += stress_score;
            count += 1;
            details.push(WordStressDetail {
                word: word.word.clone(),
                stress_score,
                is_correctly_stressed: stress_score >= 80.0,
            });
        }
    }

    StressAnalysis {
        overall_stress_score: if count > 0 { total / count as f64 } else { 0.0 },
        details,
    }
}
