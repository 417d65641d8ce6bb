//! Chat proxy HTTP server (single port): `/api/chat`, `/api/summary` and a health check.

use crate::config::Config;
use crate::llm::{ChatMessage, ModelGateway, OpenAiClient};
use crate::prompts::Prompts;
use crate::proxy::protocol::{
    parse_request, ChatReply, SummaryReply, CHAT_FALLBACK, SUMMARY_FALLBACK,
};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Output bound and randomness for each endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub temperature: f32,
    pub chat_max_tokens: u32,
    pub summary_max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self::from(&crate::config::ModelConfig::default())
    }
}

impl From<&crate::config::ModelConfig> for Sampling {
    fn from(m: &crate::config::ModelConfig) -> Self {
        Self {
            temperature: m.temperature,
            chat_max_tokens: m.chat_max_tokens,
            summary_max_tokens: m.summary_max_tokens,
        }
    }
}

/// Shared, immutable state for all requests. The proxy keeps no session state.
#[derive(Clone)]
pub struct ProxyState {
    pub gateway: Arc<dyn ModelGateway>,
    pub prompts: Arc<Prompts>,
    pub sampling: Sampling,
    /// Port reported by the health check.
    pub port: u16,
}

/// Which endpoint a request came in on; selects payload, bound and fallback.
#[derive(Clone, Copy)]
enum Endpoint {
    Chat,
    Summary,
}

impl Endpoint {
    fn name(self) -> &'static str {
        match self {
            Endpoint::Chat => "chat",
            Endpoint::Summary => "summary",
        }
    }

    fn instruction(self, prompts: &Prompts) -> &str {
        match self {
            Endpoint::Chat => &prompts.chat,
            Endpoint::Summary => &prompts.summary,
        }
    }

    fn max_tokens(self, sampling: &Sampling) -> u32 {
        match self {
            Endpoint::Chat => sampling.chat_max_tokens,
            Endpoint::Summary => sampling.summary_max_tokens,
        }
    }
}

/// Build the router (CORS open to all origins).
pub fn router(state: ProxyState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/", get(health_http))
        .route("/api/chat", post(chat_http))
        .route("/api/summary", post(summary_http))
        .layer(cors)
        .with_state(state)
}

/// Run the proxy; binds to config.server.bind:config.server.port and blocks until shutdown
/// (Ctrl+C / SIGTERM).
/// `config_path` is used to resolve prompt files.
pub async fn run_proxy(config: Config, config_path: PathBuf) -> Result<()> {
    let prompts = Prompts::load(&config, &config_path)?;
    let gateway = OpenAiClient::from_config(&config);
    if crate::config::resolve_api_key(&config).is_none() {
        log::warn!(
            "no model credential configured; set OPENAI_API_KEY or model.apiKey \
             (requests will get the fallback reply)"
        );
    }
    log::info!("using model {} at {}", gateway.model(), config.model.base_url);

    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    let port = listener.local_addr().map(|a| a.port()).unwrap_or(config.server.port);
    log::info!("proxy listening on {}", bind_addr);

    let state = ProxyState {
        gateway: Arc::new(gateway),
        prompts: Arc::new(prompts),
        sampling: Sampling::from(&config.model),
        port,
    };
    serve(listener, state, shutdown_signal()).await?;
    log::info!("proxy stopped");
    Ok(())
}

/// Serve on an already-bound listener until `shutdown` completes.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: ProxyState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("proxy server exited")
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns a simple health JSON (for health checks).
async fn health_http(State(state): State<ProxyState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
    }))
}

/// POST /api/chat: `{ messages }` → `{ reply }`.
async fn chat_http(State(state): State<ProxyState>, body: Bytes) -> (StatusCode, Json<ChatReply>) {
    match forward(&state, Endpoint::Chat, &body).await {
        Ok(reply) => (StatusCode::OK, Json(ChatReply { reply })),
        Err(status) => (
            status,
            Json(ChatReply {
                reply: CHAT_FALLBACK.to_string(),
            }),
        ),
    }
}

/// POST /api/summary: `{ messages }` → `{ summary }`.
async fn summary_http(
    State(state): State<ProxyState>,
    body: Bytes,
) -> (StatusCode, Json<SummaryReply>) {
    match forward(&state, Endpoint::Summary, &body).await {
        Ok(summary) => (StatusCode::OK, Json(SummaryReply { summary })),
        Err(status) => (
            status,
            Json(SummaryReply {
                summary: SUMMARY_FALLBACK.to_string(),
            }),
        ),
    }
}

/// Validate the body, prepend the endpoint's payload and call the model once.
/// Errors are logged here and reduced to a status; details never reach the caller.
async fn forward(
    state: &ProxyState,
    endpoint: Endpoint,
    body: &[u8],
) -> Result<String, StatusCode> {
    let messages: Vec<ChatMessage> = parse_request(body).map_err(|e| {
        log::warn!("{}: rejecting malformed request body: {}", endpoint.name(), e);
        StatusCode::BAD_REQUEST
    })?;
    log::debug!(
        "{}: forwarding {} message(s) to the model",
        endpoint.name(),
        messages.len()
    );
    state
        .gateway
        .complete(
            endpoint.instruction(&state.prompts),
            &messages,
            endpoint.max_tokens(&state.sampling),
            state.sampling.temperature,
        )
        .await
        .map_err(|e| {
            log::error!("{}: model call failed: {}", endpoint.name(), e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
