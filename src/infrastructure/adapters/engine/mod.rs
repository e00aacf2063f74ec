//! 语音引擎适配器

pub mod azure_speech_client;
pub mod fake_engine;

pub use azure_speech_client::AzureSpeechClient;
pub use fake_engine::FakeSpeechEngine;
