pub mod agent_core;
pub mod commands;
pub mod config;
pub mod inference;
pub mod mcp_client;

use std::sync::Arc;

use thiserror::Error;

use agent_core::Orchestrator;
use config::{GatewayConfig, LogFormat};
use inference::{ChatModel, InferenceClient, InferenceError};
use mcp_client::{McpError, ResilientRpcClient};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "toolgate=info,warn";

/// Errors raised while wiring the gateway together.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("llm client: {0}")]
    Inference(#[from] InferenceError),

    #[error("rpc client: {0}")]
    Rpc(#[from] McpError),
}

/// Initialize the tracing subscriber on stdout.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`]. Calling this twice is a no-op.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);

    let result = match format {
        LogFormat::Json => builder.json().flatten_event(true).with_current_span(true).try_init(),
        LogFormat::Text => builder.with_ansi(false).try_init(),
    };
    if result.is_err() {
        return;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        format = ?format,
        "=== toolgate starting ==="
    );
}

/// Build the orchestrator and its production backends from config.
pub fn build_orchestrator(config: &GatewayConfig) -> Result<Orchestrator, StartupError> {
    let llm: Arc<dyn ChatModel> = Arc::new(InferenceClient::from_config(&config.llm)?);
    let rpc = Arc::new(ResilientRpcClient::from_config(&config.rpc)?);

    tracing::info!(
        llm_enabled = config.llm.enabled,
        llm_base_url = %config.llm.base_url,
        model = %config.llm.model,
        rpc_enabled = config.rpc.enabled,
        rpc_endpoint = %config.rpc.endpoint,
        static_session = config.rpc.static_session().is_some(),
        rate_limit = config.rate_limit.requests_per_minute,
        rate_window_secs = config.rate_limit.window_secs,
        filter_keywords = config.filter_keywords.len(),
        "gateway configured"
    );

    Ok(Orchestrator::new(config, llm, rpc))
}

/// Build the HTTP router for `config`.
pub fn build_router(config: &GatewayConfig) -> Result<axum::Router, StartupError> {
    let orchestrator = build_orchestrator(config)?;
    Ok(commands::router(Arc::new(orchestrator)))
}
