//! Dev-only inspection surface. This is the single place a raw access
//! token may cross the gateway boundary; nothing here belongs in a
//! production deployment.

use axum::extract::Query;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use waygate_core::time::unix_now;

use crate::error::GatewayErrorResponse;
use crate::gateway::GatewayState;

#[derive(Debug, Deserialize)]
pub struct DebugParams {
    pub sid: String,
}

/// `POST /debug/session/reset`: drop every session.
pub async fn reset_route(Extension(state): Extension<GatewayState>) -> Json<Value> {
    let cleared = state.sessions.reset().await;
    warn!("Debug reset dropped {} session(s)", cleared);
    Json(json!({ "cleared": cleared }))
}

/// `GET /debug/token?sid=`: reveal a session's token material.
pub async fn token_route(
    Extension(state): Extension<GatewayState>,
    Query(params): Query<DebugParams>,
) -> Result<Json<Value>, GatewayErrorResponse> {
    let session = state
        .sessions
        .snapshot(&params.sid)
        .await
        .ok_or_else(|| GatewayErrorResponse::invalid_request("unknown session"))?;

    Ok(Json(json!({
        "sid": session.sid,
        "ready": session.is_ready(unix_now()),
        "access_token": session.access_token,
        "expires_at": session.expires_at,
        "scope": session.scope_string,
        "audience": session.audience,
    })))
}

/// `GET /debug/introspect?sid=`: introspect a session's token at its AS
/// and relay the verdict.
pub async fn introspect_route(
    Extension(state): Extension<GatewayState>,
    Query(params): Query<DebugParams>,
) -> Result<Json<Value>, GatewayErrorResponse> {
    let session = state
        .sessions
        .snapshot(&params.sid)
        .await
        .ok_or_else(|| GatewayErrorResponse::invalid_request("unknown session"))?;

    let token = session
        .access_token
        .as_deref()
        .ok_or_else(|| GatewayErrorResponse::invalid_request("session holds no token"))?;

    let introspection_endpoint = session
        .as_metadata
        .introspection_endpoint
        .as_deref()
        .ok_or_else(|| {
            GatewayErrorResponse::invalid_request("session's AS offers no introspection")
        })?;

    let verdict: Value = state
        .http
        .post(introspection_endpoint)
        .form(&[("token", token)])
        .send()
        .await
        .map_err(|error| GatewayErrorResponse::bad_gateway(Some(error.to_string())))?
        .json()
        .await
        .map_err(|error| GatewayErrorResponse::bad_gateway(Some(error.to_string())))?;

    Ok(Json(verdict))
}
