//! 基础设施层 - 端口的具体实现
//!
//! HTTP 服务、外部引擎适配器、临时音频存储、
//! 内存缓存与 WebSocket 流式会话管理

pub mod adapters;
pub mod http;
pub mod memory;
pub mod streaming;
