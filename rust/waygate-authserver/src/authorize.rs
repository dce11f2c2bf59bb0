use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::{Extension, Json};
use serde::Deserialize;
use url::Url;

use waygate_core::entropy::random_urlsafe;
use waygate_core::error::{ErrorBody, ErrorCode};

use crate::server::{AuthServerState, AuthorizationRequest};

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub resource: Option<String>,
}

type AuthorizeRejection = (StatusCode, Json<ErrorBody>);

fn invalid_request(detail: &str) -> AuthorizeRejection {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::with_detail(ErrorCode::InvalidRequest, detail)),
    )
}

fn error_redirect(redirect_uri: &Url, error: &str, state: Option<&str>) -> Redirect {
    let mut target = redirect_uri.clone();
    {
        let mut pairs = target.query_pairs_mut();
        pairs.append_pair("error", error);
        if let Some(state) = state {
            pairs.append_pair("state", state);
        }
    }
    Redirect::to(target.as_str())
}

/// `GET /authorize`: validate the client, its redirect URI and the S256
/// PKCE parameters, auto-approve consent, and send the user agent back to
/// the client with a fresh single-use code.
///
/// Client and redirect-URI failures surface as a 400 (the redirect target
/// cannot be trusted yet); everything after that is reported by redirect,
/// per RFC 6749 §4.1.2.1.
pub async fn authorize_route(
    Extension(state): Extension<AuthServerState>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Redirect, AuthorizeRejection> {
    let client_id = params
        .client_id
        .as_deref()
        .ok_or_else(|| invalid_request("client_id is required"))?;
    let redirect_uri = params
        .redirect_uri
        .as_deref()
        .ok_or_else(|| invalid_request("redirect_uri is required"))?;

    let clients = state.clients.read().await;
    let client = clients
        .get(client_id)
        .ok_or_else(|| invalid_request("unknown client_id"))?;

    if !client.redirect_uris.iter().any(|uri| uri == redirect_uri) {
        return Err(invalid_request("redirect_uri is not registered"));
    }

    let redirect_uri_parsed =
        Url::parse(redirect_uri).map_err(|_| invalid_request("redirect_uri must be a URL"))?;
    let opaque_state = params.state.as_deref();

    if params.response_type.as_deref() != Some("code") {
        return Ok(error_redirect(
            &redirect_uri_parsed,
            "unsupported_response_type",
            opaque_state,
        ));
    }

    let code_challenge = match params.code_challenge.as_deref() {
        Some(challenge) if !challenge.is_empty() => challenge,
        _ => {
            return Ok(error_redirect(
                &redirect_uri_parsed,
                "invalid_request",
                opaque_state,
            ))
        }
    };

    if params.code_challenge_method.as_deref() != Some("S256") {
        return Ok(error_redirect(
            &redirect_uri_parsed,
            "invalid_request",
            opaque_state,
        ));
    }

    // Demo profile: the resource owner is assumed present and consenting.
    info!(
        "Auto-approving authorization for client {} (scope {:?})",
        client_id, params.scope
    );

    let code = random_urlsafe(32);
    let request = AuthorizationRequest {
        client_id: client_id.to_string(),
        redirect_uri: redirect_uri.to_string(),
        scope: params.scope.clone().unwrap_or_default(),
        code_challenge: code_challenge.to_string(),
        resource_indicator: params.resource.clone(),
    };

    drop(clients);
    state.codes.write().await.insert(code.clone(), request);

    let mut target = redirect_uri_parsed;
    {
        let mut pairs = target.query_pairs_mut();
        pairs.append_pair("code", &code);
        if let Some(opaque) = opaque_state {
            pairs.append_pair("state", opaque);
        }
    }

    Ok(Redirect::to(target.as_str()))
}
