//! 应用状态
//!
//! 所有 handler 共享的依赖集合

use std::sync::Arc;

use crate::application::ports::{AssetStorePort, SpeechEnginePort};
use crate::application::{AssessmentOrchestrator, RetryingEngineClient};
use crate::config::StreamingConfig;
use crate::infrastructure::streaming::StreamingSessionManager;

/// 应用状态
pub struct AppState {
    pub asset_store: Arc<dyn AssetStorePort>,
    pub engine: Arc<dyn SpeechEnginePort>,
    pub engine_client: Arc<RetryingEngineClient>,
    pub orchestrator: Arc<AssessmentOrchestrator>,
    pub streaming: Arc<StreamingSessionManager>,
    pub streaming_config: StreamingConfig,
    pub api_key: String,
    pub default_voice: String,
    pub max_upload_size: usize,
}
