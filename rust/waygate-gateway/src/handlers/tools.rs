use axum::extract::{Path, RawQuery};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::Value;

use waygate_core::time::unix_now;
use waygate_core::tools::tool_by_name;

use crate::error::GatewayErrorResponse;
use crate::gateway::GatewayState;
use crate::obligations::{enforce, ObligationViolation, RequestFacts};
use crate::proxy;

/// `GET|POST /mcp/<tool>`: the authenticated, obligation-checked forward.
///
/// Session selection is by capability: the freshest ready session whose
/// granted scopes include the tool's required scope. Holding a ticket
/// session buys nothing on the payment path.
#[instrument(level = "debug", skip_all, fields(tool = %tool_name))]
pub async fn tool_route(
    Extension(state): Extension<GatewayState>,
    Path(tool_name): Path<String>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    body: Option<Json<Value>>,
) -> Result<Response, GatewayErrorResponse> {
    let tool = tool_by_name(&tool_name)
        .ok_or_else(|| GatewayErrorResponse::invalid_request("unknown tool"))?;

    if method.as_str() != tool.method {
        return Err(GatewayErrorResponse::invalid_request(format!(
            "{} must be called with {}",
            tool.gateway_path, tool.method
        )));
    }

    let now = unix_now();
    let session = state
        .sessions
        .select_ready_for_scope(tool.required_scope, now)
        .await
        .ok_or_else(|| {
            debug!("No ready session holds {}", tool.required_scope);
            GatewayErrorResponse::login_required()
        })?;

    let body = body.map(|Json(body)| body);

    // What the request claims about itself, for obligation checks
    let facts = RequestFacts {
        order_id: body
            .as_ref()
            .and_then(|body| body.get("orderId"))
            .and_then(Value::as_str),
        amount_cents: body
            .as_ref()
            .and_then(|body| body.get("amount_cents"))
            .and_then(Value::as_u64),
        merchant_id: body
            .as_ref()
            .and_then(|body| body.get("merchant_id"))
            .and_then(Value::as_str),
    };

    if let Err(violation) = enforce(&session.obligations, session.obligations_issued_at, &facts, now)
    {
        return Err(match violation {
            ObligationViolation::TtlElapsed => {
                // The whole grant has aged out: revoke locally, force re-auth
                info!("Obligations on {} aged out; clearing token", session.sid);
                state.sessions.clear_token(&session.sid).await;
                GatewayErrorResponse::obligation_ttl_expired()
            }
            violation => {
                info!("Obligation violation on {}: {}", session.sid, violation);
                GatewayErrorResponse::obligation_violation(&violation.to_string())
            }
        });
    }

    let query: Vec<(String, String)> = raw_query
        .as_deref()
        .map(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();

    let url = proxy::upstream_url(&session, tool, facts.order_id, &query)
        .ok_or_else(|| GatewayErrorResponse::invalid_request("orderId is required"))?;

    // The wallet token joins the body here; the agent never carries it
    let body = match (tool.tool_id, body) {
        ("mcp.pay", Some(mut payment)) => {
            let wallet = state.config.wallet_pm_token.clone().ok_or_else(|| {
                error!("WALLET_PM_TOKEN is not configured; refusing to forward a payment");
                GatewayErrorResponse::bad_gateway(None)
            })?;
            if let Some(fields) = payment.as_object_mut() {
                fields.insert("payment_method_token".into(), Value::String(wallet));
            }
            Some(payment)
        }
        (_, body) => body,
    };

    match proxy::forward(&state.http, &session, tool, url, body).await {
        Ok(proxied) => Ok(proxied.into_response()),
        Err(proxy::ProxyError::TokenRejected) => {
            // The RS no longer honors this token; drop it and ask the agent
            // to re-authenticate
            warn!("Upstream rejected the token of session {}", session.sid);
            state.sessions.clear_token(&session.sid).await;
            Err(GatewayErrorResponse::login_required())
        }
        Err(proxy::ProxyError::Transport(detail)) => {
            error!("Upstream unreachable: {}", detail);
            Err(GatewayErrorResponse::bad_gateway(
                state.config.debug_detail.then_some(detail),
            ))
        }
    }
}
