//! 临时音频暂存
//!
//! 上传的音频落到本地暂存目录，请求结束即释放；
//! 后台清扫按修改时间兜底回收被遗漏的文件

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::application::ports::{mime_type_for_extension, AssetError, AssetStorePort, AudioAsset};

const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];

/// 临时音频存储
pub struct TempAssetStore {
    dir: PathBuf,
    max_size_bytes: u64,
    max_age: Duration,
}

impl TempAssetStore {
    /// 创建存储并确保暂存目录存在
    pub fn new(dir: impl Into<PathBuf>, max_size_bytes: u64, max_age: Duration) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_size_bytes,
            max_age,
        })
    }

    /// 启动后台清扫任务
    pub fn spawn_sweeper(store: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.sweep().await {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::info!(removed = removed, "Swept stale scratch files");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Scratch sweep failed");
                    }
                }
            }
        });
    }

    fn validate(&self, bytes: &[u8], extension: &str) -> Result<(), AssetError> {
        if bytes.is_empty() {
            return Err(AssetError::Validation("Audio payload is empty".to_string()));
        }
        if bytes.len() as u64 > self.max_size_bytes {
            return Err(AssetError::Validation(format!(
                "Audio payload exceeds {} bytes",
                self.max_size_bytes
            )));
        }
        if !SUPPORTED_EXTENSIONS.contains(&extension) {
            return Err(AssetError::Validation(format!(
                "Unsupported audio format: {}",
                extension
            )));
        }
        if !signature_matches(bytes, extension) {
            return Err(AssetError::Validation(format!(
                "Audio content does not look like {}",
                extension
            )));
        }
        Ok(())
    }
}

/// 按扩展名检查文件头魔数
fn signature_matches(bytes: &[u8], extension: &str) -> bool {
    match extension {
        "wav" => bytes.starts_with(b"RIFF"),
        "ogg" => bytes.starts_with(b"OggS"),
        "flac" => bytes.starts_with(b"fLaC"),
        // MP3 允许 ID3 标签或裸帧同步字
        "mp3" => {
            bytes.starts_with(b"ID3")
                || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
        }
        _ => false,
    }
}

#[async_trait]
impl AssetStorePort for TempAssetStore {
    async fn stage(&self, bytes: &[u8], extension: &str) -> Result<AudioAsset, AssetError> {
        let extension = extension.to_ascii_lowercase();
        self.validate(bytes, &extension)?;

        let id = Uuid::new_v4();
        let path = self.dir.join(format!("audio-{}.{}", id, extension));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AssetError::Io(format!("Failed to stage audio: {}", e)))?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "Staged audio asset");
        Ok(AudioAsset {
            id,
            mime_type: mime_type_for_extension(&extension),
            content_hash: format!("{:x}", md5::compute(bytes)),
            size_bytes: bytes.len() as u64,
            extension,
            path,
            created_at: Utc::now(),
        })
    }

    /// 释放是幂等的：文件已不存在时只记一条日志
    async fn release(&self, asset: &AudioAsset) {
        match tokio::fs::remove_file(&asset.path).await {
            Ok(()) => {
                tracing::debug!(path = %asset.path.display(), "Released audio asset");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %asset.path.display(), "Asset already released");
            }
            Err(e) => {
                tracing::warn!(path = %asset.path.display(), error = %e, "Failed to release asset");
            }
        }
    }

    async fn allocate_output(&self, extension: &str) -> Result<PathBuf, AssetError> {
        Ok(self
            .dir
            .join(format!("tts-{}.{}", Uuid::new_v4(), extension)))
    }

    /// 删除暂存目录中超龄的文件，返回删除数量
    async fn sweep(&self) -> Result<usize, AssetError> {
        let mut removed = 0usize;
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| AssetError::Io(format!("Failed to read scratch dir: {}", e)))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AssetError::Io(format!("Failed to read scratch dir: {}", e)))?
        {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let expired = metadata
                .modified()
                .ok()
                .and_then(|mtime| mtime.elapsed().ok())
                .map(|age| age >= self.max_age)
                .unwrap_or(false);
            if expired {
                // 清扫与请求内释放可能竞争同一文件，NotFound 不算失败
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to sweep file");
                    }
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn store(dir: &Path) -> TempAssetStore {
        TempAssetStore::new(dir, 10 * 1024 * 1024, Duration::from_secs(1800)).unwrap()
    }

    #[tokio::test]
    async fn test_stage_writes_file_with_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let asset = store.stage(b"RIFFxxxxWAVE", "wav").await.unwrap();
        assert!(asset.path.exists());
        assert_eq!(asset.extension, "wav");
        assert_eq!(asset.mime_type, "audio/wav");
        assert_eq!(
            asset.content_hash,
            format!("{:x}", md5::compute(b"RIFFxxxxWAVE"))
        );
        let name = asset.path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("audio-") && name.ends_with(".wav"));
    }

    #[tokio::test]
    async fn test_stage_rejects_empty_and_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let small = TempAssetStore::new(dir.path(), 8, Duration::from_secs(1800)).unwrap();

        assert!(matches!(
            small.stage(b"", "wav").await,
            Err(AssetError::Validation(_))
        ));
        assert!(matches!(
            small.stage(b"RIFFxxxxWAVE", "wav").await,
            Err(AssetError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_rejects_unsupported_and_mismatched_signature() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert!(matches!(
            store.stage(b"RIFFxxxx", "aac").await,
            Err(AssetError::Validation(_))
        ));
        // 扩展名说是 wav，内容不是 RIFF
        assert!(matches!(
            store.stage(b"OggSxxxx", "wav").await,
            Err(AssetError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_mp3_signatures() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert!(store.stage(b"ID3\x04\x00rest", "mp3").await.is_ok());
        assert!(store.stage(&[0xFF, 0xFB, 0x90, 0x00], "mp3").await.is_ok());
        assert!(store.stage(b"notmp3data", "mp3").await.is_err());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let asset = store.stage(b"RIFFxxxxWAVE", "wav").await.unwrap();
        store.release(&asset).await;
        assert!(!asset.path.exists());
        // 第二次释放不 panic
        store.release(&asset).await;
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        // max_age 为零：所有文件立即视为超龄
        let eager = TempAssetStore::new(dir.path(), 10 * 1024, Duration::ZERO).unwrap();
        let asset = eager.stage(b"RIFFxxxxWAVE", "wav").await.unwrap();

        let removed = eager.sweep().await.unwrap();
        assert_eq!(removed, 1);
        assert!(!asset.path.exists());

        // max_age 很大：新文件不会被清扫
        let lazy = store(dir.path());
        let asset = lazy.stage(b"RIFFxxxxWAVE", "wav").await.unwrap();
        assert_eq!(lazy.sweep().await.unwrap(), 0);
        assert!(asset.path.exists());
    }

    #[tokio::test]
    async fn test_allocate_output_is_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let a = store.allocate_output("mp3").await.unwrap();
        let b = store.allocate_output("mp3").await.unwrap();
        assert_ne!(a, b);
        assert!(a.to_str().unwrap().ends_with(".mp3"));
    }
}
