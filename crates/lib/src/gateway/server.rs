//! Gateway HTTP server: webhook intake, operator endpoints and health on one port.

use crate::chat::{ChatPlatform, GraphClient};
use crate::config::{self, Config};
use crate::format::NotificationFormatter;
use crate::gateway::{config_api, teams_api, webhook};
use crate::messaging::{IntercomClient, MessagingPlatform};
use crate::processor::{DeliveryTarget, EventProcessor};
use crate::store::TeamsChannelsStore;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

const SERVICE_NAME: &str = "Intercom Teams Relay";

/// Shared state for all routes. Clients are created once at startup and shared by
/// request handlers and background tasks.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub processor: Arc<EventProcessor>,
    pub store: Arc<TeamsChannelsStore>,
    /// Resolved once; `None` disables signature verification.
    pub webhook_secret: Option<String>,
}

impl GatewayState {
    pub fn new(config: Config, processor: Arc<EventProcessor>, store: TeamsChannelsStore) -> Self {
        let webhook_secret = config::resolve_webhook_secret(&config);
        Self {
            config: Arc::new(config),
            processor,
            store: Arc::new(store),
            webhook_secret,
        }
    }
}

/// Build the processor from config around the given clients.
pub fn build_processor(
    config: &Config,
    chat: Arc<dyn ChatPlatform>,
    messaging: Arc<dyn MessagingPlatform>,
) -> EventProcessor {
    let formatter = NotificationFormatter::new(Some(config.intercom.app_url.clone()));
    let target = DeliveryTarget {
        team_id: config::resolve_default_team_id(config),
        channel_name: config.relay.default_channel_name.clone(),
        channel_description: config.relay.channel_description.clone(),
    };
    EventProcessor::new(chat, messaging, formatter, target)
}

/// All routes. The webhook path comes from `gateway.webhookPath`.
pub fn build_router(state: GatewayState) -> Router {
    let webhook_path = config::normalized_webhook_path(&state.config);
    Router::new()
        .route("/", get(root_http))
        .route("/health", get(health_http))
        .route(&webhook_path, post(webhook::intercom_webhook))
        .route("/teams", get(teams_api::list_teams))
        .route(
            "/teams/:team_id/channels",
            get(teams_api::list_channels).post(teams_api::create_channel),
        )
        .route(
            "/teams/:team_id/channels/:channel_id/messages",
            get(teams_api::list_messages).post(teams_api::send_message),
        )
        .route("/teams/message-from-intercom", post(teams_api::forward_to_intercom))
        .route("/intercom/conversations", get(teams_api::list_conversations))
        .route(
            "/intercom/conversations/search",
            get(teams_api::search_conversations),
        )
        .route("/sync/conversation-to-teams", post(teams_api::sync_conversation))
        .route(
            "/api/config",
            get(config_api::get_config).post(config_api::replace_config),
        )
        .route("/api/config/teams", post(config_api::add_team))
        .route(
            "/api/config/teams/:team_id",
            put(config_api::update_team).delete(config_api::delete_team),
        )
        .route("/api/config/teams/:team_id/channels", post(config_api::add_channel))
        .route(
            "/api/config/teams/:team_id/channels/:channel_id",
            delete(config_api::delete_channel),
        )
        .with_state(state)
}

/// Run the gateway server. Blocks until shutdown (Ctrl+C or SIGTERM).
/// `config_path` is used to resolve the mapping store location.
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    let webhook_secret = config::resolve_webhook_secret(&config);
    if webhook_secret.is_none() {
        if !config::is_loopback_bind(&bind) {
            anyhow::bail!(
                "refusing to bind gateway to {} without a webhook secret (set intercom.webhookSecret or INTERCOM_WEBHOOK_SECRET)",
                bind
            );
        }
        log::warn!("no webhook secret configured; webhook signatures will not be verified");
    }

    let graph = Arc::new(GraphClient::new(
        Some(config.graph.base_url.clone()),
        Some(config.graph.authority_url.clone()),
        config::resolve_graph_credentials(&config),
    ));
    if let Err(e) = graph.authenticate().await {
        log::warn!("continuing without Microsoft Graph ({}); Teams delivery is disabled", e);
    }
    let intercom = Arc::new(IntercomClient::new(
        Some(config.intercom.base_url.clone()),
        config::resolve_intercom_token(&config),
    ));
    if config::resolve_default_team_id(&config).is_none() {
        log::warn!("no default team configured; webhook notifications will not be posted");
    }

    let processor = Arc::new(build_processor(&config, graph.clone(), intercom));
    let store = TeamsChannelsStore::new(config::resolve_store_path(&config, &config_path));
    log::info!("teams/channels mapping store at {}", store.path().display());

    let port = config.gateway.port;
    let webhook_path = config::normalized_webhook_path(&config);
    let app = build_router(GatewayState::new(config, processor, store));

    let bind_addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {} (webhooks at {})", bind_addr, webhook_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    graph.close().await;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Background tasks still running at that point are dropped with the runtime.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns a simple liveness JSON (for probes).
async fn root_http() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health reports whether Graph is authenticated; `degraded` when it is not.
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let graph_api = state.processor.chat().is_authenticated();
    let webhook_handler = true;
    let status = if graph_api && webhook_handler {
        "healthy"
    } else {
        "degraded"
    };
    Json(json!({
        "status": status,
        "timestamp": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        "services": {
            "graph_api": graph_api,
            "webhook_handler": webhook_handler,
        },
    }))
}
