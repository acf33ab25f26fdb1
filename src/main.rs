use anyhow::Context;

use toolgate::config::{load_config, resolve_config_path};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let explicit = std::env::args().nth(1);
    let path = resolve_config_path(explicit.as_deref());
    let config = load_config(&path).with_context(|| format!("loading {}", path.display()))?;

    toolgate::init_tracing(config.log_format);
    tracing::info!(config = %path.display(), "configuration loaded");

    let app = toolgate::build_router(&config).context("building gateway")?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
