//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `HATSUON_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `HATSUON_SERVER__PORT=8080`
/// - `HATSUON_SPEECH__KEY=xxxx`
/// - `HATSUON_SPEECH__REGION=japaneast`
/// - `HATSUON_AUTH__API_KEY=secret`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3000)?
        .set_default("speech.key", "")?
        .set_default("speech.region", "")?
        .set_default("speech.language", "ja-JP")?
        .set_default("speech.timeout_secs", 30)?
        .set_default("speech.max_retries", 3)?
        .set_default("speech.retry_delay_ms", 1000)?
        .set_default("speech.default_voice", "ja-JP-NanamiNeural")?
        .set_default("auth.api_key", "")?
        .set_default("storage.scratch_dir", "data/tmp")?
        .set_default("storage.max_upload_size", 10 * 1024 * 1024)?
        .set_default("cache.ttl_secs", 300)?
        .set_default("sweep.enabled", true)?
        .set_default("sweep.interval_secs", 300)?
        .set_default("sweep.max_age_secs", 1800)?
        .set_default("streaming.max_connections", 100)?
        .set_default("streaming.session_timeout_secs", 300)?
        .set_default("streaming.ping_interval_secs", 30)?
        .set_default("log.level", "info")?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: HATSUON_
    // 层级分隔符: __ (双下划线)
    // 例如: HATSUON_SPEECH__REGION=japaneast
    builder = builder.add_source(
        Environment::with_prefix("HATSUON")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
///
/// 缺少任何必填项时拒绝启动
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.speech.key.is_empty() {
        return Err(ConfigError::ValidationError(
            "Speech engine key is required (HATSUON_SPEECH__KEY)".to_string(),
        ));
    }

    if config.speech.region.is_empty() && config.speech.endpoint.is_none() {
        return Err(ConfigError::ValidationError(
            "Speech engine region is required (HATSUON_SPEECH__REGION)".to_string(),
        ));
    }

    if config.auth.api_key.is_empty() {
        return Err(ConfigError::ValidationError(
            "Client API key is required (HATSUON_AUTH__API_KEY)".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.speech.max_retries == 0 {
        return Err(ConfigError::ValidationError(
            "speech.max_retries must be at least 1".to_string(),
        ));
    }

    if config.sweep.enabled && config.sweep.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Sweep interval cannot be 0 when sweep is enabled".to_string(),
        ));
    }

    if config.streaming.max_connections == 0 {
        return Err(ConfigError::ValidationError(
            "streaming.max_connections must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志，不含密钥）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Speech Region: {}", config.speech.region);
    tracing::info!("Speech Language: {}", config.speech.language);
    tracing::info!("Speech Timeout: {}s", config.speech.timeout_secs);
    tracing::info!(
        "Speech Retries: {} (delay {}ms)",
        config.speech.max_retries,
        config.speech.retry_delay_ms
    );
    tracing::info!("Scratch Directory: {:?}", config.storage.scratch_dir);
    tracing::info!("Max Upload Size: {} bytes", config.storage.max_upload_size);
    tracing::info!("Cache TTL: {}s", config.cache.ttl_secs);
    tracing::info!("Sweep Enabled: {}", config.sweep.enabled);
    if config.sweep.enabled {
        tracing::info!("Sweep Interval: {}s", config.sweep.interval_secs);
        tracing::info!("Asset Max Age: {}s", config.sweep.max_age_secs);
    }
    tracing::info!("Streaming Max Connections: {}", config.streaming.max_connections);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.speech.key = "test-key".to_string();
        config.speech.region = "japaneast".to_string();
        config.auth.api_key = "client-key".to_string();
        config
    }

    #[test]
    fn test_validation_passes_for_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validation_error_for_missing_speech_key() {
        let mut config = valid_config();
        config.speech.key = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_missing_region() {
        let mut config = valid_config();
        config.speech.region = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_endpoint_override_replaces_region() {
        let mut config = valid_config();
        config.speech.region = String::new();
        config.speech.endpoint = Some("http://localhost:9000".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_missing_api_key() {
        let mut config = valid_config();
        config.auth.api_key = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = valid_config();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_retries() {
        let mut config = valid_config();
        config.speech.max_retries = 0;
        assert!(validate_config(&config).is_err());
    }
}
