//! Hatsuon - 日语发音评测 API 服务
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Assessment: 评测值对象与纯分析逻辑（JLPT 分级、语速评级、优劣势分析）
//! - Intent: 基于关键词的意图分类（玩具实现）
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SpeechEngine, AssetStore, ResultCache）
//! - RetryingEngineClient: 引擎调用的重试 + 缓存包装
//! - AssessmentOrchestrator: 并发引擎调用编排与结果合成
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + WebSocket 实时识别
//! - Adapters: Azure Speech REST 客户端、临时音频资产存储
//! - Memory: 结果缓存内存实现
//! - Streaming: 实时识别会话管理（准入控制、心跳、超时）

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
