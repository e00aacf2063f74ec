//! 流式会话准入
//!
//! 原子计数器实现的并发会话上限；
//! 票据在 Drop 时恰好归还一次名额，路径异常也不会泄漏

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 流式会话管理器
pub struct StreamingSessionManager {
    live: AtomicUsize,
    max_connections: usize,
}

impl StreamingSessionManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            live: AtomicUsize::new(0),
            max_connections,
        }
    }

    /// 尝试占用一个会话名额
    ///
    /// 已满时返回 None；成功时名额与返回的票据绑定
    pub fn try_admit(manager: &Arc<Self>) -> Option<SessionTicket> {
        let admitted = manager
            .live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
                if live < manager.max_connections {
                    Some(live + 1)
                } else {
                    None
                }
            })
            .is_ok();
        if admitted {
            Some(SessionTicket {
                manager: Arc::clone(manager),
            })
        } else {
            tracing::warn!(
                max_connections = manager.max_connections,
                "Streaming session rejected, capacity reached"
            );
            None
        }
    }

    /// 当前活跃会话数
    pub fn active_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 会话票据，Drop 时归还名额
pub struct SessionTicket {
    manager: Arc<StreamingSessionManager>,
}

impl Drop for SessionTicket {
    fn drop(&mut self) {
        self.manager.release();
    }
}
