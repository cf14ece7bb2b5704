use std::net::SocketAddr;
use std::sync::Arc;

use codesync::config::ServerConfig;
use codesync::llm::{LlmChat, LlmClient};
use codesync::rate_limit::RateLimitConfig;
use codesync::services::execution::{CodeRunner, ExecutionConfig, Judge0Client};
use codesync::{routes, state};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().expect("invalid server config");
    let port = config.port;

    // Initialize LLM client (non-fatal: assistant disabled if config missing).
    let llm: Option<Arc<dyn LlmChat>> = match LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured, assistant disabled");
            None
        }
    };

    // Same for the code runner.
    let runner: Option<Arc<dyn CodeRunner>> = match ExecutionConfig::from_env().map(Judge0Client::new) {
        Some(Ok(client)) => {
            tracing::info!("code runner initialized");
            Some(Arc::new(client))
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "code runner failed to initialize, execution disabled");
            None
        }
        None => {
            tracing::warn!("code runner not configured, execution disabled");
            None
        }
    };

    let state = state::AppState::new(config, llm, runner, RateLimitConfig::from_env());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "codesync listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server failed");
}
