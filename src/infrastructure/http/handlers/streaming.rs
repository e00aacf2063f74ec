//! WebSocket 流式识别 handler
//!
//! 连接生命周期：准入（超限 1013 关闭）→ select 循环
//! （socket 帧 / 30s 心跳 / 会话超时 1000 关闭 / 引擎出站消息）→
//! 断开时后台完成引擎侧停止

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::infrastructure::http::state::AppState;
use crate::infrastructure::streaming::{RecognitionSession, ServerMessage, StreamingSessionManager};

/// GET /ws/recognize
pub async fn recognize_ws(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: Arc<AppState>, mut socket: WebSocket) {
    // 名额在升级后才占用，超限连接立刻以 1013 关闭
    let ticket = match StreamingSessionManager::try_admit(&state.streaming) {
        Some(ticket) => ticket,
        None => {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::AGAIN,
                    reason: "Too many concurrent sessions".into(),
                })))
                .await;
            return;
        }
    };

    tracing::info!(
        active = state.streaming.active_sessions(),
        "Streaming session opened"
    );

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(64);
    let mut session = RecognitionSession::new(Arc::clone(&state.engine), outbound_tx);

    let session_timeout = Duration::from_secs(state.streaming_config.session_timeout_secs);
    let ping_interval = Duration::from_secs(state.streaming_config.ping_interval_secs);
    let timeout = tokio::time::sleep(session_timeout);
    tokio::pin!(timeout);
    let mut ping = tokio::time::interval(ping_interval);
    ping.tick().await; // 吃掉立即触发的首个 tick
    let mut alive = true;

    loop {
        tokio::select! {
            _ = &mut timeout => {
                tracing::info!("Streaming session timed out");
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: "Session timeout".into(),
                    })))
                    .await;
                break;
            }
            _ = ping.tick() => {
                if !alive {
                    tracing::warn!("Streaming session failed liveness check, terminating");
                    break;
                }
                alive = false;
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            outbound = outbound_rx.recv() => {
                let Some(message) = outbound else { break };
                let payload = match serde_json::to_string(&message) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize server message");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => session.handle_text(&text).await,
                    Some(Ok(Message::Binary(data))) => session.handle_binary(data).await,
                    Some(Ok(Message::Pong(_))) => alive = true,
                    Some(Ok(Message::Ping(_))) => {} // axum 自动回 pong
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Streaming session closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket read error");
                        break;
                    }
                }
            }
        }
    }

    session.close();
    drop(ticket);
}
