//! 应用层错误定义
//!
//! 统一的请求处理错误类型

use thiserror::Error;

use super::ports::{AssetError, EngineError};

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 输入校验错误（引擎调用发生之前）
    #[error("Validation error: {0}")]
    Validation(String),

    /// 鉴权失败
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 资源未找到
    #[error("Not found: {0}")]
    NotFound(String),

    /// 引擎调用失败（重试包装之后仍然失败）
    #[error("Speech engine error: {0}")]
    Engine(#[from] EngineError),

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// 创建校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<AssetError> for ApplicationError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::Validation(msg) => ApplicationError::Validation(msg),
            AssetError::Io(msg) => ApplicationError::Storage(msg),
        }
    }
}
