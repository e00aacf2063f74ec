//! 应用层 - 用例编排
//!
//! 定义依赖端口（ports），并在其之上实现引擎调用包装与评测编排

pub mod engine_client;
pub mod error;
pub mod orchestrator;
pub mod ports;

pub use engine_client::{RetryPolicy, RetryingEngineClient};
pub use error::ApplicationError;
pub use orchestrator::{AssessmentOrchestrator, AssessmentOutcome};
