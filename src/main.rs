use anonchat_relay::{config::Config, error::AppError, error::Result, routes, state::AppState};
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anonchat_relay=info,tower_http=info".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting anonchat relay...");

    let config = Config::from_env().map_err(|e| AppError::Config(e.to_string()))?;
    info!("Configuration loaded");

    let state = AppState::new(config.clone()).await?;
    let _background = state.spawn_background_tasks();
    info!("Application state initialized");

    let app = routes::create_router(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid SERVER__HOST: {}", e)))?;
    let addr = SocketAddr::from((host, config.server.port));

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to bind: {}", e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Server error: {}", e)))?;

    Ok(())
}
