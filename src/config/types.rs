//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

/// 应用主配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 外部语音引擎配置
    #[serde(default)]
    pub speech: SpeechConfig,

    /// 客户端鉴权配置
    #[serde(default)]
    pub auth: AuthConfig,

    /// 临时音频存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 结果缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// 孤儿资产清扫配置
    #[serde(default)]
    pub sweep: SweepConfig,

    /// 实时识别配置
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 外部语音引擎配置（Azure Speech）
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// 订阅 key（必填，启动时校验）
    #[serde(default)]
    pub key: String,

    /// 服务区域，如 "japaneast"（必填，启动时校验）
    #[serde(default)]
    pub region: String,

    /// 覆盖区域推导的基础 URL（测试用）
    #[serde(default)]
    pub endpoint: Option<String>,

    /// 识别语言
    #[serde(default = "default_language")]
    pub language: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_speech_timeout")]
    pub timeout_secs: u64,

    /// 瞬时错误最大尝试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 重试间隔（毫秒）
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// 默认合成音色
    #[serde(default = "default_voice")]
    pub default_voice: String,
}

fn default_language() -> String {
    "ja-JP".to_string()
}

fn default_speech_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_voice() -> String {
    "ja-JP-NanamiNeural".to_string()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            region: String::new(),
            endpoint: None,
            language: default_language(),
            timeout_secs: default_speech_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            default_voice: default_voice(),
        }
    }
}

/// 客户端鉴权配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// API key（必填，启动时校验）
    #[serde(default)]
    pub api_key: String,
}

/// 临时音频存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 临时音频目录
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// 上传文件最大大小（字节），默认 10MB
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("data/tmp")
}

fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024 // 10 MB
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

/// 结果缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 条目存活时间（秒）
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_ttl() -> u64 {
    300 // 5 分钟
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

/// 孤儿资产清扫配置
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// 是否启用后台清扫
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,

    /// 清扫间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// 资产最大存活时间（秒），超过即视为孤儿
    #[serde(default = "default_sweep_max_age")]
    pub max_age_secs: u64,
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    300 // 5 分钟
}

fn default_sweep_max_age() -> u64 {
    1800 // 30 分钟
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            interval_secs: default_sweep_interval(),
            max_age_secs: default_sweep_max_age(),
        }
    }
}

/// 实时识别配置
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    /// 并发连接上限
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// 会话无条件超时（秒）
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,

    /// 心跳 ping 间隔（秒）
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

fn default_max_connections() -> usize {
    100
}

fn default_session_timeout() -> u64 {
    300 // 5 分钟
}

fn default_ping_interval() -> u64 {
    30
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            session_timeout_secs: default_session_timeout(),
            ping_interval_secs: default_ping_interval(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.speech.language, "ja-JP");
        assert_eq!(config.speech.max_retries, 3);
        assert_eq!(config.speech.retry_delay_ms, 1000);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.sweep.max_age_secs, 1800);
        assert_eq!(config.storage.max_upload_size, 10 * 1024 * 1024);
        assert_eq!(config.streaming.session_timeout_secs, 300);
        assert_eq!(config.streaming.ping_interval_secs, 30);
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_secrets_default_empty() {
        let config = AppConfig::default();
        assert!(config.speech.key.is_empty());
        assert!(config.speech.region.is_empty());
        assert!(config.auth.api_key.is_empty());
    }
}
