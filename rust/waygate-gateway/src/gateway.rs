use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Result;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Extension, Router};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::handlers;
use crate::policy::AuthorizerClient;
use crate::session::SessionTable;

/// Shared state behind every gateway handler.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub http: reqwest::Client,
    pub sessions: SessionTable,
    pub authorizer: AuthorizerClient,
    /// Cached dynamic-registration `client_id`s, keyed by AS issuer
    pub client_ids: Arc<RwLock<HashMap<String, String>>>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Self {
        let http = reqwest::Client::new();
        let authorizer = AuthorizerClient::new(http.clone(), config.authorizer_base.clone());

        GatewayState {
            config: Arc::new(config),
            http,
            sessions: SessionTable::new(),
            authorizer,
            client_ids: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

fn router(state: GatewayState) -> Result<Router> {
    let mut cors = CorsLayer::new();

    if let Some(cors_origin) = &state.config.cors_origin {
        cors = cors
            .allow_origin(
                cors_origin
                    .origin()
                    .unicode_serialization()
                    .as_str()
                    .parse::<HeaderValue>()?,
            )
            .allow_headers(Any)
            .allow_methods(vec![Method::GET, Method::POST]);
    }

    Ok(Router::new()
        .route("/session/start", post(handlers::session::start_route))
        .route("/session/status", get(handlers::session::status_route))
        .route("/oauth/callback", get(handlers::callback::callback_route))
        .route("/consent", get(handlers::consent::consent_page_route))
        .route("/consent/approve", post(handlers::consent::approve_route))
        .route(
            "/mcp/:tool",
            get(handlers::tools::tool_route).post(handlers::tools::tool_route),
        )
        .route("/healthz", get(|| async { "ok" }))
        .route("/debug/session/reset", post(handlers::debug::reset_route))
        .route("/debug/token", get(handlers::debug::token_route))
        .route("/debug/introspect", get(handlers::debug::introspect_route))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Start the gateway on an already-bound listener.
pub async fn start_gateway(listener: TcpListener, config: GatewayConfig) -> Result<()> {
    let state = GatewayState::new(config);

    info!(
        r#"A gateway stands between agent "{}" and {}

It terminates OAuth sessions for {} at {:?}"#,
        state.config.agent_id,
        state.config.upstream,
        state.config.subject,
        listener.local_addr()?
    );

    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;

    axum::serve(listener, router(state)?.into_make_service()).await?;

    Ok(())
}
