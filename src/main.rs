//! hatsuon - 日语发音评测服务
//!
//! HTTP + WebSocket 编排服务，真实的语音处理全部委托给外部引擎

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use hatsuon::application::{AssessmentOrchestrator, RetryPolicy, RetryingEngineClient};
use hatsuon::config::{load_config, print_config};
use hatsuon::infrastructure::adapters::engine::AzureSpeechClient;
use hatsuon::infrastructure::adapters::storage::TempAssetStore;
use hatsuon::infrastructure::http::{AppState, HttpServer};
use hatsuon::infrastructure::memory::InMemoryResultCache;
use hatsuon::infrastructure::streaming::StreamingSessionManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone())),
        )
        .init();

    print_config(&config);

    let engine = Arc::new(
        AzureSpeechClient::new(&config.speech).context("Failed to build speech engine client")?,
    );
    let cache = Arc::new(InMemoryResultCache::new());

    let asset_store = Arc::new(
        TempAssetStore::new(
            &config.storage.scratch_dir,
            config.storage.max_upload_size,
            Duration::from_secs(config.sweep.max_age_secs),
        )
        .context("Failed to initialize scratch directory")?,
    );
    if config.sweep.enabled {
        TempAssetStore::spawn_sweeper(
            Arc::clone(&asset_store),
            Duration::from_secs(config.sweep.interval_secs),
        );
    }

    let engine_client = Arc::new(RetryingEngineClient::new(
        engine.clone(),
        cache,
        RetryPolicy {
            max_attempts: config.speech.max_retries,
            delay: Duration::from_millis(config.speech.retry_delay_ms),
        },
        Duration::from_secs(config.cache.ttl_secs),
    ));
    let orchestrator = Arc::new(AssessmentOrchestrator::new(Arc::clone(&engine_client)));
    let streaming = Arc::new(StreamingSessionManager::new(
        config.streaming.max_connections,
    ));

    let state = Arc::new(AppState {
        asset_store,
        engine,
        engine_client,
        orchestrator,
        streaming,
        streaming_config: config.streaming.clone(),
        api_key: config.auth.api_key.clone(),
        default_voice: config.speech.default_voice.clone(),
        max_upload_size: config.storage.max_upload_size as usize,
    });

    let server = HttpServer::new(config.server.clone(), state);
    server
        .run_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}
