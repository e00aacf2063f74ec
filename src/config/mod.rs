//! Configuration - 配置管理
//!
//! 多源配置加载：环境变量 > 配置文件 > 默认值

mod loader;
mod types;

pub use loader::{load_config, load_config_from_path, print_config, ConfigError};
pub use types::{
    AppConfig, AuthConfig, CacheConfig, LogConfig, ServerConfig, SpeechConfig, StorageConfig,
    StreamingConfig, SweepConfig,
};
