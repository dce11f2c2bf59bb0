use axum::extract::Query;
use axum::{Extension, Json};

use waygate_core::api::{
    ConsentRequest, EvaluateRequest, SessionStartRequest, SessionStartResponse,
    SessionStatusParams, SessionStatusResponse,
};
use waygate_core::entropy::{random_hex, random_urlsafe};
use waygate_core::pkce::PkcePair;
use waygate_core::state::{context_digest, sign_state, StatePayload};
use waygate_core::time::unix_now;
use waygate_core::tools::tool_by_id;

use crate::discovery;
use crate::error::GatewayErrorResponse;
use crate::gateway::GatewayState;
use crate::oauth::{self, AuthorizeUrlParams};
use crate::session::{Session, SessionPkce};

/// `POST /session/start`: the whole opening handshake.
///
/// Discovery, policy, consent, PKCE, state signing and session creation in
/// one pass; the response is only ever a `sid` plus the URL the user agent
/// must visit. Tokens enter the session later, at the callback.
#[instrument(level = "debug", skip_all, fields(tool_id = %request.tool_id))]
pub async fn start_route(
    Extension(state): Extension<GatewayState>,
    Json(request): Json<SessionStartRequest>,
) -> Result<Json<SessionStartResponse>, GatewayErrorResponse> {
    let tool = tool_by_id(&request.tool_id)
        .ok_or_else(|| GatewayErrorResponse::invalid_request("unknown tool_id"))?;

    if request.scope.trim().is_empty() {
        return Err(GatewayErrorResponse::invalid_request("scope is required"));
    }

    // 1-2: discover the RS and its AS
    let discovered = discovery::discover(
        &state.http,
        &state.config.upstream,
        &state.config.probe_path,
        state.config.rs_metadata_fallback.as_ref(),
        state.config.as_metadata_url.as_ref(),
    )
    .await
    .map_err(|error| {
        warn!("Discovery failed: {:?}", error);
        GatewayErrorResponse::start_failed(
            state.config.debug_detail.then(|| error.to_string()),
        )
    })?;

    let audience = discovered.rs_metadata.resource.clone();

    // 3: policy
    let evaluation = state
        .authorizer
        .evaluate(&EvaluateRequest {
            subject: state.config.subject.clone(),
            agent_id: state.config.agent_id.clone(),
            tool_id: request.tool_id.clone(),
            audience: audience.clone(),
            requested_scopes: vec![request.scope.clone()],
            context: request.context.clone(),
        })
        .await?;

    if !evaluation.allow {
        info!(
            "Policy denied {} for {}: {:?}",
            request.tool_id, state.config.agent_id, evaluation.reason
        );
        return Err(GatewayErrorResponse::denied_by_policy(evaluation.reason));
    }

    let granted_scopes = if evaluation.scopes.is_empty() {
        vec![request.scope.clone()]
    } else {
        evaluation.scopes
    };
    let scope_string = granted_scopes.join(" ");

    // The AS knows this gateway as a dynamically registered public client
    let client_id = oauth::ensure_client_registration(
        &state.http,
        &discovered.as_metadata,
        &state.config.callback_url(),
        &state.client_ids,
    )
    .await?;

    // 5: PKCE and the signed state envelope
    let sid = random_hex(16);
    let nonce = random_urlsafe(16);
    let pkce = PkcePair::generate();

    let state_token = sign_state(
        &StatePayload {
            sid: sid.clone(),
            iat: unix_now(),
            aud: audience.clone(),
            scope: scope_string.clone(),
            n: nonce.clone(),
            ctx_digest: context_digest(&request.context),
        },
        state.config.state_secret.as_bytes(),
    )?;

    // 4: consent decision; denial routes the user through the gateway's own
    // consent page instead of straight to the AS
    let consent = state
        .authorizer
        .consent(&ConsentRequest {
            subject: state.config.subject.clone(),
            agent_id: state.config.agent_id.clone(),
            tool_id: request.tool_id.clone(),
            audience: audience.clone(),
            scopes: granted_scopes.clone(),
            explicit: false,
        })
        .await?;

    let authorize_url = if consent.allow {
        debug!("Consent auto-granted ({:?})", consent.record_id);
        oauth::build_authorize_url(
            &discovered.as_metadata.authorization_endpoint,
            &AuthorizeUrlParams {
                client_id: &client_id,
                redirect_uri: &state.config.callback_url(),
                scope: &scope_string,
                state: &state_token,
                code_challenge: &pkce.challenge,
                resource: &audience,
            },
        )?
    } else {
        debug!("Consent requires an explicit step ({:?})", consent.reason);
        state.config.consent_url(&sid)
    };

    // 6: the session exists from here on
    let session = Session {
        sid: sid.clone(),
        nonce,
        tool_id: request.tool_id.clone(),
        requested_scopes: granted_scopes,
        scope_string,
        context: request.context,
        audience,
        upstream: state.config.upstream.clone(),
        rs_metadata: discovered.rs_metadata,
        as_metadata: discovered.as_metadata,
        client_id,
        pkce: SessionPkce {
            verifier: Some(pkce.verifier),
            challenge: pkce.challenge,
        },
        state_token,
        obligations: evaluation.obligations,
        obligations_issued_at: unix_now(),
        access_token: None,
        refresh_token: None,
        expires_at: 0,
        obtained_at: 0,
        used: false,
    };

    state.sessions.insert(session).await;

    info!("Opened session {} for {}", sid, request.tool_id);

    Ok(Json(SessionStartResponse {
        sid,
        authorize_url: authorize_url.to_string(),
    }))
}

/// `GET /session/status`: a single readiness bit, by `sid` or by scope.
/// Nothing else about the session — least of all its token — leaves here.
pub async fn status_route(
    Extension(state): Extension<GatewayState>,
    Query(params): Query<SessionStatusParams>,
) -> Result<Json<SessionStatusResponse>, GatewayErrorResponse> {
    let now = unix_now();

    let ready = match (&params.sid, &params.scope) {
        (Some(sid), _) => state
            .sessions
            .snapshot(sid)
            .await
            .map(|session| session.is_ready(now))
            .unwrap_or(false),
        (None, Some(scope)) => state.sessions.any_ready_for_scope(scope, now).await,
        (None, None) => {
            return Err(GatewayErrorResponse::invalid_request(
                "one of sid or scope is required",
            ))
        }
    };

    Ok(Json(SessionStatusResponse { ready }))
}
