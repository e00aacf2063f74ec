//! Assessment Context - 发音评测上下文
//!
//! 评测模式、JLPT 分级、语速评级等值对象，
//! 以及优劣势分析、重音推导等纯函数

mod analysis;
mod value_objects;

pub use analysis::{analyze_strengths_weaknesses, derive_word_stress, AnalysisReport};
pub use value_objects::{
    AssessmentMode, JlptLevel, PhonemeDetail, PronunciationScores, SpeechRate,
    SpeechRateAssessment, SpeechRateRating, StressAnalysis, WordDetail, WordStressDetail,
};
