use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};

use waygate_core::api::CallbackParams;
use waygate_core::error::ErrorBody;
use waygate_core::state::verify_state;
use waygate_core::time::unix_now;

use crate::gateway::GatewayState;
use crate::oauth::{self, ExchangeError};
use crate::session::FinalizeError;

/// Token lifetime assumed when the AS omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECONDS: u64 = 900;

fn bad_request(error: &str, detail: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: error.into(),
            detail: Some(detail.into()),
        }),
    )
        .into_response()
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
  <head><title>{title}</title></head>
  <body>
    <h1>{title}</h1>
    <p>{body}</p>
  </body>
</html>"#
    )
}

/// `GET /oauth/callback`: the return leg of the authorization flow.
///
/// The signed state must verify, the session it names must exist and be
/// unspent, and the state's bound audience/scope must match what the
/// session was opened with. Only then is the code exchanged and the
/// session finalized; a replayed callback fails the unspent check.
#[instrument(level = "debug", skip_all)]
pub async fn callback_route(
    Extension(state): Extension<GatewayState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    // An error from the AS is terminal for this visit but mutates nothing
    if let Some(error) = params.error.as_deref() {
        warn!("Authorization server reported: {}", error);
        let description = params.error_description.as_deref().unwrap_or("");
        return Html(page(
            "Authorization failed",
            &format!("The authorization server reported: {} {}", error, description),
        ))
        .into_response();
    }

    let (Some(code), Some(state_token)) = (params.code.as_deref(), params.state.as_deref())
    else {
        return bad_request("invalid_request", "code and state are required");
    };

    let payload = match verify_state(state_token, state.config.state_secret.as_bytes()) {
        Ok(payload) => payload,
        Err(error) => {
            warn!("Refusing callback with unverifiable state: {}", error);
            return bad_request(&error.to_string(), "state verification failed");
        }
    };

    let Some(session) = state.sessions.snapshot(&payload.sid).await else {
        return bad_request("invalid_request", "state names an unknown session");
    };

    if session.used {
        return bad_request("invalid_request", "session already used");
    }

    // Replay defense: the signed bindings must agree with the session
    if payload.aud != session.audience
        || payload.scope != session.scope_string
        || payload.n != session.nonce
    {
        warn!("State bindings disagree with session {}", session.sid);
        return bad_request("invalid_request", "state does not match the session");
    }

    let Some(verifier) = session.pkce.verifier.as_deref() else {
        return bad_request("invalid_request", "session has no pending exchange");
    };

    let tokens = match oauth::exchange_code(
        &state.http,
        &session.as_metadata.token_endpoint,
        code,
        &state.config.callback_url(),
        &session.client_id,
        verifier,
        &session.audience,
    )
    .await
    {
        Ok(tokens) => tokens,
        Err(ExchangeError::Refused { status, body }) => {
            warn!("Token exchange refused ({}): {}", status, body);
            return (
                StatusCode::BAD_GATEWAY,
                Html(page(
                    "Token exchange failed",
                    "The authorization server refused to exchange the code. \
                     The session has not been activated; start again.",
                )),
            )
                .into_response();
        }
        Err(error) => {
            error!("Token exchange failed: {}", error);
            return (
                StatusCode::BAD_GATEWAY,
                Html(page("Token exchange failed", "Could not reach the authorization server.")),
            )
                .into_response();
        }
    };

    let now = unix_now();
    let expires_at = now + tokens.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS);

    match state
        .sessions
        .finalize(&session.sid, tokens.access_token, tokens.refresh_token, expires_at, now)
        .await
    {
        Ok(()) => {
            info!("Session {} is ready", session.sid);
            Html(page(
                "Authorization complete",
                "This window can be closed; the agent's session is ready.",
            ))
            .into_response()
        }
        Err(FinalizeError::AlreadyUsed) => {
            bad_request("invalid_request", "session already used")
        }
        Err(FinalizeError::UnknownSession) => {
            bad_request("invalid_request", "session disappeared during exchange")
        }
    }
}
