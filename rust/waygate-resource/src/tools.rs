use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use waygate_core::error::{ErrorBody, ErrorCode};

use crate::auth::{BearerIdentity, ResourceRejection};

#[derive(Debug, Deserialize)]
pub struct EchoParams {
    #[serde(default)]
    pub msg: String,
}

/// `GET /mcp/echo?msg=`: the smallest possible protected tool.
pub async fn echo_route(
    identity: BearerIdentity,
    Query(params): Query<EchoParams>,
) -> Result<Json<Value>, ResourceRejection> {
    identity.require_scope("echo:read")?;

    Ok(Json(json!({
        "ok": true,
        "echo": params.msg,
        "user": identity.subject,
        "scope": "echo:read",
    })))
}

/// `GET /tickets`: a canned ticket listing for the demo.
pub async fn tickets_route(identity: BearerIdentity) -> Result<Json<Value>, ResourceRejection> {
    identity.require_scope("tickets:read")?;

    Ok(Json(json!({
        "ok": true,
        "user": identity.subject,
        "tickets": [
            { "id": "tkt-8801", "event": "Interop Night", "status": "confirmed" },
            { "id": "tkt-8802", "event": "Protocol Conf", "status": "pending" },
        ],
    })))
}

/// `POST /orders/{orderId}/pay`: charge an order.
///
/// The payment method token is supplied by the gateway's wallet, never by
/// the agent; a missing token is a 422 so the omission is distinguishable
/// from a malformed request.
pub async fn pay_route(
    identity: BearerIdentity,
    Path(order_id): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, (StatusCode, Json<ErrorBody>)> {
    identity
        .require_scope("payments:charge")
        .map_err(|_| forbidden())?;

    let Some(Json(body)) = body else {
        return Err(bad_request("a JSON body is required"));
    };

    let amount_cents = body
        .get("amount_cents")
        .and_then(Value::as_u64)
        .ok_or_else(|| bad_request("amount_cents is required"))?;
    let merchant_id = body
        .get("merchant_id")
        .and_then(Value::as_str)
        .ok_or_else(|| bad_request("merchant_id is required"))?;

    let payment_method_token = match body.get("payment_method_token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => token,
        _ => {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorBody::with_detail(
                    ErrorCode::InvalidRequest,
                    "payment_method_token is required",
                )),
            ))
        }
    };

    info!(
        "Charging order {} for {} cents at {} (user {})",
        order_id, amount_cents, merchant_id, identity.subject
    );

    Ok(Json(json!({
        "status": "succeeded",
        "order_id": order_id,
        "amount_cents": amount_cents,
        "merchant_id": merchant_id,
        "charged_with": mask(payment_method_token),
    })))
}

fn bad_request(detail: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::with_detail(ErrorCode::InvalidRequest, detail)),
    )
}

fn forbidden() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorBody::new(ErrorCode::InsufficientScope)),
    )
}

/// Keep only enough of the payment token to correlate logs.
fn mask(token: &str) -> String {
    let skip = token.chars().count().saturating_sub(4);
    let tail: String = token.chars().skip(skip).collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_keeps_only_the_tail() {
        assert_eq!(mask("pm-wallet-7788"), "...7788");
        assert_eq!(mask("abc"), "...abc");
    }
}
