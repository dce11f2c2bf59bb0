use axum::extract::Query;
use axum::response::{Html, Redirect};
use axum::{Extension, Form};

use waygate_core::api::{ConsentParams, ConsentRequest};

use crate::error::GatewayErrorResponse;
use crate::gateway::GatewayState;
use crate::oauth::{self, AuthorizeUrlParams};

/// `GET /consent?sid=`: the page a user lands on when policy wants a human
/// in the loop before the session may proceed to the AS.
pub async fn consent_page_route(
    Extension(state): Extension<GatewayState>,
    Query(params): Query<ConsentParams>,
) -> Result<Html<String>, GatewayErrorResponse> {
    let session = state
        .sessions
        .snapshot(&params.sid)
        .await
        .ok_or_else(|| GatewayErrorResponse::invalid_request("unknown session"))?;

    Ok(Html(format!(
        r#"<!doctype html>
<html>
  <head><title>Approve agent access</title></head>
  <body>
    <h1>Approve agent access</h1>
    <p>Agent <code>{agent}</code> asks to use <code>{tool}</code> with scopes <code>{scopes}</code>.</p>
    <form method="post" action="/consent/approve">
      <input type="hidden" name="sid" value="{sid}" />
      <button type="submit">Approve</button>
    </form>
  </body>
</html>"#,
        agent = state.config.agent_id,
        tool = session.tool_id,
        scopes = session.scope_string,
        sid = session.sid,
    )))
}

/// `POST /consent/approve`: record explicit consent with the authorizer and
/// bounce the user onward to the real authorization endpoint. The session's
/// PKCE challenge and signed state were minted at start and are reused
/// unchanged.
pub async fn approve_route(
    Extension(state): Extension<GatewayState>,
    Form(params): Form<ConsentParams>,
) -> Result<Redirect, GatewayErrorResponse> {
    let session = state
        .sessions
        .snapshot(&params.sid)
        .await
        .ok_or_else(|| GatewayErrorResponse::invalid_request("unknown session"))?;

    let consent = state
        .authorizer
        .consent(&ConsentRequest {
            subject: state.config.subject.clone(),
            agent_id: state.config.agent_id.clone(),
            tool_id: session.tool_id.clone(),
            audience: session.audience.clone(),
            scopes: session.requested_scopes.clone(),
            explicit: true,
        })
        .await?;

    if !consent.allow {
        return Err(GatewayErrorResponse::denied_by_policy(consent.reason));
    }

    info!(
        "Explicit consent recorded for session {} ({:?})",
        session.sid, consent.record_id
    );

    let authorize_url = oauth::build_authorize_url(
        &session.as_metadata.authorization_endpoint,
        &AuthorizeUrlParams {
            client_id: &session.client_id,
            redirect_uri: &state.config.callback_url(),
            scope: &session.scope_string,
            state: &session.state_token,
            code_challenge: &session.pkce.challenge,
            resource: &session.audience,
        },
    )?;

    Ok(Redirect::to(authorize_url.as_str()))
}
