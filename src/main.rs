//! Main entry point for the image generation studio

use imagegen_studio::{api, config::Settings, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env: {}", e);
        }
    }

    let settings = Settings::load()?;
    settings.validate()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    info!("Starting image generation studio");
    info!(
        host = %settings.server.host,
        port = settings.server.port,
        auth = settings.auth.enabled,
        blob_mode = %settings.storage.blob_mode,
        "Loaded configuration"
    );
    if settings.huggingface.api_key.is_empty() {
        warn!("No Hugging Face API key configured, direct inference requests will be rejected");
    }

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let sweep_interval = Duration::from_secs(settings.cache.sweep_interval_secs.max(1));

    let app_state = Arc::new(AppState::from_settings(settings)?);
    app_state.sweeper.start(sweep_interval).await;

    let app = api::create_router(app_state.clone());

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.sweeper.stop().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
