use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use waygate_core::metadata::BearerChallenge;

use crate::config::ResourceConfig;
use crate::{metadata, tools};

/// Shared state behind every resource server handler.
#[derive(Clone)]
pub struct ResourceState {
    pub config: Arc<ResourceConfig>,
    pub http: reqwest::Client,
}

impl ResourceState {
    /// The bearer challenge unauthenticated callers receive.
    pub fn challenge(&self, description: &str) -> BearerChallenge {
        BearerChallenge {
            realm: Some(self.config.resource.clone()),
            error: Some("invalid_token".into()),
            error_description: Some(description.into()),
            resource_metadata: Some(self.config.prm_url().to_string()),
        }
    }
}

fn router(state: ResourceState) -> Router {
    Router::new()
        .route(
            "/.well-known/oauth-protected-resource",
            get(metadata::metadata_route),
        )
        .route("/mcp/echo", get(tools::echo_route))
        .route("/tickets", get(tools::tickets_route))
        .route("/orders/:order_id/pay", post(tools::pay_route))
        .route("/healthz", get(|| async { "ok" }))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Start the resource server on an already-bound listener.
pub async fn start_resource_server(listener: TcpListener, config: ResourceConfig) -> Result<()> {
    let state = ResourceState {
        config: Arc::new(config),
        http: reqwest::Client::new(),
    };

    info!(
        "Resource server guarding {} on {:?}",
        state.config.resource,
        listener.local_addr()?
    );

    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;

    axum::serve(listener, router(state).into_make_service()).await?;

    Ok(())
}
