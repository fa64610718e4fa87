//! Gateway HTTP server: health probe and the LINE webhook.

use crate::channels::signature::{self, SIGNATURE_HEADER};
use crate::channels::{LineChannel, ReplyChannel, WebhookBody};
use crate::config::{Config, Credentials};
use crate::gateway::events::{self, EventContext};
use crate::llm::{OpenAiClient, TextGenerator};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

/// Body returned when event processing failed; still 200 so LINE does not redeliver.
pub const HANDLED_BODY: &str = "handled";

/// Shared state for the gateway. Built once at startup; no per-request mutation.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Secret for x-line-signature. None means the webhook answers with a diagnostic.
    pub channel_secret: Option<String>,
    /// Reply channel. None when the access token is missing.
    pub channel: Option<Arc<dyn ReplyChannel>>,
    /// Generation client. None means echo mode.
    pub generator: Option<Arc<dyn TextGenerator>>,
    /// Required LINE variables that were not configured at startup.
    missing_vars: Vec<&'static str>,
}

impl GatewayState {
    /// Build state with real LINE and OpenAI clients for whatever credentials are present.
    pub fn new(config: Config, credentials: Credentials) -> Self {
        let missing_vars = credentials.missing_line_vars();
        let channel = credentials.access_token.map(|token| {
            Arc::new(LineChannel::new(token, config.channels.line.api_base.clone()))
                as Arc<dyn ReplyChannel>
        });
        let generator = credentials.api_key.map(|key| {
            Arc::new(OpenAiClient::new(key, config.generation.base_url.clone()))
                as Arc<dyn TextGenerator>
        });
        Self {
            config: Arc::new(config),
            channel_secret: credentials.channel_secret,
            channel,
            generator,
            missing_vars,
        }
    }
}

/// Routes are served at the root and again under `/api`.
pub fn router(state: GatewayState) -> Router {
    let routes = Router::new()
        .route("/health", get(health_http))
        .route("/webhook", post(line_webhook));
    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Credentials come from the environment (or config). Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let credentials = Credentials::resolve(&config);
    let missing = credentials.missing_line_vars();
    if !missing.is_empty() {
        log::warn!(
            "missing {}; webhook will answer with a diagnostic until configured",
            missing.join(", ")
        );
    }
    if credentials.api_key.is_some() {
        log::info!(
            "generation enabled: model {} ({:?} prompt)",
            config.generation.model,
            config.generation.prompt_style
        );
    } else {
        log::info!("no generation api key; replies echo the user's text");
    }

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let state = GatewayState::new(config, credentials);
    if let Some(ref channel) = state.channel {
        log::info!("{} channel ready", channel.id());
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
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

/// GET /health: plain "ok" for probes.
async fn health_http() -> &'static str {
    "ok"
}

/// POST /webhook: verifies x-line-signature, then replies to each event.
/// Everything after the signature check answers 200 so LINE does not retry.
async fn line_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (Some(secret), Some(channel)) = (state.channel_secret.as_deref(), state.channel.clone())
    else {
        log::error!(
            "missing LINE credentials: has_secret={} has_token={}",
            state.channel_secret.is_some(),
            state.channel.is_some()
        );
        let text = format!("LINE env missing: set {}", state.missing_vars.join(" and "));
        return (StatusCode::OK, text).into_response();
    };

    let Some(provided) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return (StatusCode::UNAUTHORIZED, "no signature").into_response();
    };
    if !signature::verify(secret, &body, provided) {
        log::warn!("webhook signature validation failed");
        return (StatusCode::UNAUTHORIZED, "signature validation failed").into_response();
    }

    let payload: WebhookBody = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("webhook body is not valid JSON: {}", e);
            return (StatusCode::BAD_REQUEST, "invalid webhook body").into_response();
        }
    };
    log::debug!(
        "webhook: {} event(s) for {}",
        payload.events.len(),
        payload.destination.as_deref().unwrap_or("-")
    );

    let ctx = EventContext {
        channel,
        generator: state.generator.clone(),
        generation: Arc::new(state.config.generation.clone()),
    };
    match events::handle_events(payload.events, &ctx).await {
        Ok(results) => Json(results).into_response(),
        Err(e) => {
            log::error!("webhook error: {}", e);
            (StatusCode::OK, HANDLED_BODY).into_response()
        }
    }
}
