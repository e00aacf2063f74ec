//! 流式识别会话状态机
//!
//! 与传输层解耦：输入是文本控制帧与二进制音频帧，
//! 输出经 outbound 通道发回。引擎事件由独立泵任务转发

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::application::ports::{RecognitionEvent, SpeechEnginePort, StreamingRecognizer};

/// 客户端控制命令
#[derive(Debug, Deserialize)]
pub struct ClientCommand {
    pub command: String,
}

/// 解析文本帧为控制命令
pub fn parse_client_command(text: &str) -> Option<ClientCommand> {
    serde_json::from_str(text).ok()
}

/// 发回客户端的消息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// 会话状态变化
    Status { message: String },
    /// 识别结果（中间或最终）
    Recognition { result: RecognitionEvent },
    /// 会话内错误，连接保持打开
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Recognizing,
    Stopping,
    Closed,
}

/// 引擎识别句柄槽位，泵任务在识别结束时清空它
type RecognizerSlot = Arc<Mutex<Option<Arc<dyn StreamingRecognizer>>>>;

/// 一条 WebSocket 连接对应的识别会话
pub struct RecognitionSession {
    engine: Arc<dyn SpeechEnginePort>,
    outbound: mpsc::Sender<ServerMessage>,
    state: Arc<Mutex<SessionState>>,
    recognizer: RecognizerSlot,
}

impl RecognitionSession {
    pub fn new(engine: Arc<dyn SpeechEnginePort>, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            engine,
            outbound,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            recognizer: Arc::new(Mutex::new(None)),
        }
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap() = next;
    }

    fn current_recognizer(&self) -> Option<Arc<dyn StreamingRecognizer>> {
        self.recognizer.lock().unwrap().clone()
    }

    async fn send(&self, message: ServerMessage) {
        if self.outbound.send(message).await.is_err() {
            tracing::debug!("Outbound channel closed, dropping server message");
        }
    }

    /// 处理文本控制帧
    pub async fn handle_text(&mut self, text: &str) {
        match parse_client_command(text).map(|c| c.command) {
            Some(command) if command == "start" => self.handle_start().await,
            Some(command) if command == "stop" => self.handle_stop().await,
            Some(command) => {
                self.send(ServerMessage::Error {
                    message: format!("Unknown command: {}", command),
                })
                .await;
            }
            None => {
                self.send(ServerMessage::Error {
                    message: "Malformed control message".to_string(),
                })
                .await;
            }
        }
    }

    /// 处理二进制音频帧
    ///
    /// 仅在 Recognizing 状态下转发给引擎，其余状态静默丢弃
    pub async fn handle_binary(&mut self, data: Vec<u8>) {
        if self.state() != SessionState::Recognizing {
            tracing::debug!(size = data.len(), "Dropping audio frame outside recognition");
            return;
        }
        if let Some(recognizer) = self.current_recognizer() {
            if let Err(err) = recognizer.push_audio(data).await {
                tracing::warn!(error = %err, "Failed to push audio to engine");
                self.send(ServerMessage::Error {
                    message: "Failed to process audio".to_string(),
                })
                .await;
            }
        }
    }

    async fn handle_start(&mut self) {
        if self.state() != SessionState::Idle {
            self.send(ServerMessage::Error {
                message: "Recognition already in progress".to_string(),
            })
            .await;
            return;
        }

        let (event_tx, event_rx) = mpsc::channel::<RecognitionEvent>(64);
        match self.engine.open_stream(event_tx).await {
            Ok(recognizer) => {
                *self.recognizer.lock().unwrap() = Some(Arc::from(recognizer));
                self.set_state(SessionState::Recognizing);
                tokio::spawn(pump_events(
                    event_rx,
                    self.outbound.clone(),
                    Arc::clone(&self.state),
                    Arc::clone(&self.recognizer),
                ));
                self.send(ServerMessage::Status {
                    message: "Recognition started".to_string(),
                })
                .await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to open recognition stream");
                self.send(ServerMessage::Error {
                    message: "Failed to start recognition".to_string(),
                })
                .await;
            }
        }
    }

    async fn handle_stop(&mut self) {
        if self.state() != SessionState::Recognizing {
            self.send(ServerMessage::Error {
                message: "No recognition in progress".to_string(),
            })
            .await;
            return;
        }
        self.set_state(SessionState::Stopping);
        if let Some(recognizer) = self.current_recognizer() {
            if let Err(err) = recognizer.stop().await {
                tracing::warn!(error = %err, "Failed to stop recognition cleanly");
                self.set_state(SessionState::Idle);
                if let Some(dead) = self.recognizer.lock().unwrap().take() {
                    dead.abort();
                }
                self.send(ServerMessage::Error {
                    message: "Failed to stop recognition".to_string(),
                })
                .await;
            }
        }
    }

    /// 连接关闭时的清理
    ///
    /// 引擎侧停止在独立任务中完成并记录失败，不阻塞关闭路径
    pub fn close(&mut self) {
        self.set_state(SessionState::Closed);
        let recognizer = self.recognizer.lock().unwrap().take();
        if let Some(recognizer) = recognizer {
            recognizer.abort();
            tokio::spawn(async move {
                if let Err(err) = recognizer.stop().await {
                    tracing::warn!(error = %err, "Engine stop after disconnect failed");
                }
            });
        }
    }
}

/// 引擎事件泵：把识别事件转成客户端消息
///
/// 识别结束（Stopped/Canceled）时回到 Idle 并释放引擎句柄
async fn pump_events(
    mut events: mpsc::Receiver<RecognitionEvent>,
    outbound: mpsc::Sender<ServerMessage>,
    state: Arc<Mutex<SessionState>>,
    recognizer: RecognizerSlot,
) {
    while let Some(event) = events.recv().await {
        let message = match event {
            RecognitionEvent::Stopped => {
                {
                    let mut state = state.lock().unwrap();
                    if *state != SessionState::Closed {
                        *state = SessionState::Idle;
                    }
                }
                recognizer.lock().unwrap().take();
                ServerMessage::Status {
                    message: "Recognition stopped".to_string(),
                }
            }
            RecognitionEvent::Canceled { reason } => {
                tracing::warn!(reason = %reason, "Recognition canceled by engine");
                {
                    let mut state = state.lock().unwrap();
                    if *state != SessionState::Closed {
                        *state = SessionState::Idle;
                    }
                }
                recognizer.lock().unwrap().take();
                ServerMessage::Error {
                    message: format!("Recognition canceled: {}", reason),
                }
            }
            event => ServerMessage::Recognition { result: event },
        };
        if outbound.send(message).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::engine::FakeSpeechEngine;

    fn session() -> (RecognitionSession, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let engine = Arc::new(FakeSpeechEngine::with_defaults());
        (RecognitionSession::new(engine, tx), rx)
    }

    async fn expect_status(rx: &mut mpsc::Receiver<ServerMessage>, expected: &str) {
        match rx.recv().await {
            Some(ServerMessage::Status { message }) => assert_eq!(message, expected),
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_start_audio_stop_flow() {
        let (mut session, mut rx) = session();

        session.handle_text(r#"{"command":"start"}"#).await;
        expect_status(&mut rx, "Recognition started").await;

        session.handle_binary(vec![0u8; 32]).await;
        match rx.recv().await {
            Some(ServerMessage::Recognition {
                result: RecognitionEvent::Recognizing { .. },
            }) => {}
            other => panic!("expected partial recognition, got {:?}", other),
        }

        session.handle_text(r#"{"command":"stop"}"#).await;
        match rx.recv().await {
            Some(ServerMessage::Recognition {
                result: RecognitionEvent::Recognized { text, .. },
            }) => assert!(!text.is_empty()),
            other => panic!("expected final recognition, got {:?}", other),
        }
        expect_status(&mut rx, "Recognition stopped").await;
    }

    #[tokio::test]
    async fn test_audio_before_start_is_dropped_silently() {
        let (mut session, mut rx) = session();

        session.handle_binary(vec![0u8; 32]).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_double_start_is_in_band_error() {
        let (mut session, mut rx) = session();

        session.handle_text(r#"{"command":"start"}"#).await;
        expect_status(&mut rx, "Recognition started").await;

        session.handle_text(r#"{"command":"start"}"#).await;
        match rx.recv().await {
            Some(ServerMessage::Error { message }) => {
                assert!(message.contains("already in progress"))
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_without_start_is_in_band_error() {
        let (mut session, mut rx) = session();

        session.handle_text(r#"{"command":"stop"}"#).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::Error { .. })));
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_commands() {
        let (mut session, mut rx) = session();

        session.handle_text("not json").await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::Error { .. })));

        session.handle_text(r#"{"command":"pause"}"#).await;
        match rx.recv().await {
            Some(ServerMessage::Error { message }) => assert!(message.contains("pause")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_restart_after_stop() {
        let (mut session, mut rx) = session();

        session.handle_text(r#"{"command":"start"}"#).await;
        expect_status(&mut rx, "Recognition started").await;
        session.handle_text(r#"{"command":"stop"}"#).await;
        // Recognized + Stopped
        let _ = rx.recv().await;
        expect_status(&mut rx, "Recognition stopped").await;

        // Stopped 事件把状态归位 Idle，可以再次 start
        session.handle_text(r#"{"command":"start"}"#).await;
        expect_status(&mut rx, "Recognition started").await;
    }

    #[tokio::test]
    async fn test_recognizer_released_when_stop_completes() {
        let (mut session, mut rx) = session();

        session.handle_text(r#"{"command":"start"}"#).await;
        expect_status(&mut rx, "Recognition started").await;
        assert!(session.recognizer.lock().unwrap().is_some());

        session.handle_text(r#"{"command":"stop"}"#).await;
        let _ = rx.recv().await; // 最终识别结果
        expect_status(&mut rx, "Recognition stopped").await;

        // 句柄随识别结束一起释放，而不是等到下次 start 或 close
        assert!(session.recognizer.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_message_wire_shape() {
        let message = ServerMessage::Recognition {
            result: RecognitionEvent::Recognizing {
                text: "こんに".to_string(),
            },
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "recognition");
        assert_eq!(json["result"]["type"], "recognizing");

        let status = serde_json::to_value(ServerMessage::Status {
            message: "Recognition started".to_string(),
        })
        .unwrap();
        assert_eq!(status["type"], "status");
    }
}
