use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::{Extension, Router};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::config::AuthServerConfig;
use crate::{authorize, introspect, metadata, register, token};

/// A registered public client.
#[derive(Clone, Debug)]
pub struct RegisteredClient {
    pub client_id: String,
    pub redirect_uris: Vec<String>,
    pub client_name: Option<String>,
}

/// A pending authorization, keyed by its single-use code. Destroyed on the
/// first `/token` exchange or on process restart.
#[derive(Clone, Debug)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code_challenge: String,
    pub resource_indicator: Option<String>,
}

/// Shared state behind every authorization server handler.
#[derive(Clone)]
pub struct AuthServerState {
    pub config: Arc<AuthServerConfig>,
    pub clients: Arc<RwLock<HashMap<String, RegisteredClient>>>,
    pub codes: Arc<RwLock<HashMap<String, AuthorizationRequest>>>,
}

impl AuthServerState {
    pub fn new(config: AuthServerConfig) -> Self {
        AuthServerState {
            config: Arc::new(config),
            clients: Arc::new(RwLock::new(HashMap::new())),
            codes: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

fn router(state: AuthServerState) -> Router {
    Router::new()
        .route(
            "/.well-known/oauth-authorization-server",
            get(metadata::metadata_route),
        )
        .route("/register", post(register::register_route))
        .route("/authorize", get(authorize::authorize_route))
        .route("/token", post(token::token_route))
        .route("/introspect", post(introspect::introspect_route))
        .route("/healthz", get(|| async { "ok" }))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Start the authorization server on an already-bound listener.
pub async fn start_authserver(listener: TcpListener, config: AuthServerConfig) -> Result<()> {
    let state = AuthServerState::new(config);

    info!(
        "Authorization server issuing as {} on {:?}",
        state.config.issuer_id(),
        listener.local_addr()?
    );

    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;

    axum::serve(listener, router(state).into_make_service()).await?;

    Ok(())
}
