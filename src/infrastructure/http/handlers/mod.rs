//! HTTP / WebSocket handlers

pub mod assessment;
pub mod intent;
pub mod status;
pub mod streaming;
pub mod synthesis;
pub mod transcription;

pub use assessment::{evaluate_pronunciation, pronunciation_assessment};
pub use intent::intent_recognition;
pub use status::service_status;
pub use streaming::recognize_ws;
pub use synthesis::text_to_speech;
pub use transcription::speech_to_text;
