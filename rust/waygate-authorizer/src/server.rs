use std::net::TcpListener;

use anyhow::Result;
use axum::routing::{delete, get, post};
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::store::DelegationStore;

/// Shared state behind every authorizer handler.
#[derive(Clone)]
pub struct AuthorizerState {
    pub store: DelegationStore,
    /// Deny when no delegation exists; the production posture
    pub strict: bool,
}

fn router(state: AuthorizerState) -> Router {
    Router::new()
        .route(
            "/delegations",
            post(handlers::submit_delegation_route).get(handlers::list_delegations_route),
        )
        .route(
            "/delegations/:subject/:agent_id/:tool_id",
            delete(handlers::delete_delegation_route),
        )
        .route("/evaluate", post(handlers::evaluate_route))
        .route("/consent", post(handlers::consent_route))
        .route("/healthz", get(|| async { "ok" }))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Start the authorizer on an already-bound listener.
pub async fn start_authorizer(
    listener: TcpListener,
    store: DelegationStore,
    strict: bool,
) -> Result<()> {
    let state = AuthorizerState { store, strict };

    info!(
        "Authorizer serving policy ({} mode) on {:?}",
        if strict { "strict" } else { "demo" },
        listener.local_addr()?
    );

    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;

    axum::serve(listener, router(state).into_make_service()).await?;

    Ok(())
}
