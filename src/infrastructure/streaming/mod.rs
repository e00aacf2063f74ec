//! WebSocket 流式识别

pub mod manager;
pub mod session;

pub use manager::{SessionTicket, StreamingSessionManager};
pub use session::{parse_client_command, ClientCommand, RecognitionSession, ServerMessage};
