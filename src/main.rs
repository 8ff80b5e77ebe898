// StoryMaker API server entry point

use storymaker::{
    api,
    core::{types::AppState, Config},
    orchestration::GenerationOrchestrator,
    services::FalClient,
    utils::{Metrics, StorageLayout},
};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    let filter = EnvFilter::new(format!(
        "storymaker={},tower_http=warn",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== STORYMAKER API ===");
    info!(
        "Config: max_upload={} bytes timeout={}s debug={}",
        config.max_file_size(),
        config.generation_timeout().as_secs(),
        if config.debug_mode() { "ON" } else { "OFF" }
    );

    let layout = StorageLayout::from_config(&config.storage);
    layout
        .ensure_dirs()
        .await
        .with_context(|| format!("Failed to create {}", layout.static_dir().display()))?;

    // Fails when FAL_API_KEY is unset
    let fal_client = FalClient::new(&config.fal).context("Failed to initialize fal.ai client")?;

    let download_client = reqwest::Client::builder()
        .timeout(config.generation_timeout())
        .build()
        .context("Failed to build download client")?;

    let metrics = Metrics::new();

    info!("Initializing generation orchestrator...");
    let orchestrator = Arc::new(GenerationOrchestrator::new(
        Arc::new(fal_client),
        layout,
        download_client,
        config.max_file_size(),
        metrics.clone(),
    ));

    let state = AppState {
        config: config.clone(),
        orchestrator,
        metrics,
    };
    let app = api::router(state);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /            - Root endpoint");
    info!("  GET  /health      - Health check");
    info!("  GET  /stats       - Generation statistics");
    info!("  GET  /gallery     - Stored result images");
    info!("  GET  /metrics     - Prometheus metrics");
    info!("  GET  /static/*    - Stored files");
    info!("  POST /generate    - Generate story images (multipart/form-data)");
    info!("  POST /face-swap   - Swap a face into a target image");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
