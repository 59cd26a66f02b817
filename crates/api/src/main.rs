use anyhow::Context;

use storefront_infra::{Engine, EngineConfig};
use storefront_observability::LogConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storefront_observability::init(&LogConfig::from_env()?);

    let config = EngineConfig::from_env()?;
    let engine = Engine::open(&config).await.context("failed to open store")?;

    let app = storefront_api::app::build_app(engine.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    engine.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown requested");
}
