//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod asset_store;
mod result_cache;
mod speech_engine;

pub use asset_store::{mime_type_for_extension, AssetError, AssetStorePort, AudioAsset};
pub use result_cache::{
    assessment_fingerprint, stress_fingerprint, synthesis_fingerprint, transcription_fingerprint,
    CachedResult, ResultCachePort,
};
pub use speech_engine::{
    EngineError, PronunciationAssessment, RecognitionEvent, SpeechEnginePort, StreamingRecognizer,
};
