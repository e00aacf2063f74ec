//! Asset Store Port - 临时音频资产管理
//!
//! 入站音频落盘为唯一命名的临时资产，请求结束后释放；
//! 后台清扫兜底回收孤儿资产

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Asset Store 错误
#[derive(Debug, Error)]
pub enum AssetError {
    /// 输入音频非法（空、过大、格式/签名不符）
    #[error("Invalid audio file: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// 已落盘的临时音频资产
///
/// 归创建它的请求独占所有权，请求的每条退出路径都必须 release；
/// 未释放的资产由后台清扫按 mtime 回收
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub id: Uuid,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub extension: String,
    pub mime_type: &'static str,
    /// 落盘时计算的内容 md5，用于缓存指纹
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Asset Store Port
#[async_trait]
pub trait AssetStorePort: Send + Sync {
    /// 将音频字节落盘为临时资产
    ///
    /// 校验失败返回 `AssetError::Validation`
    async fn stage(&self, bytes: &[u8], extension: &str) -> Result<AudioAsset, AssetError>;

    /// 释放（删除）资产
    ///
    /// 幂等且尽力而为：删除失败只记日志，绝不向调用方传播，
    /// 以免覆盖请求本身的成功/失败结果
    async fn release(&self, asset: &AudioAsset);

    /// 分配一个唯一的输出文件路径（用于合成音频的文件落盘）
    async fn allocate_output(&self, extension: &str) -> Result<PathBuf, AssetError>;

    /// 清扫超龄的孤儿资产，返回删除数量
    async fn sweep(&self) -> Result<usize, AssetError>;
}

/// 根据扩展名推导 MIME 类型
pub fn mime_type_for_extension(extension: &str) -> &'static str {
    match extension {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
