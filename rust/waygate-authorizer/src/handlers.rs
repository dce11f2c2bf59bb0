use std::str::FromStr;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::{json, Value};

use waygate_core::api::{
    ConsentRequest, ConsentResponse, DelegationStored, DelegationSubmission, EvaluateRequest,
    EvaluateResponse,
};
use waygate_core::authority::DelegationCredential;
use waygate_core::error::{ErrorBody, ErrorCode};
use waygate_core::time::unix_now;

use crate::policy;
use crate::server::AuthorizerState;
use crate::store::DelegationRecord;

type Rejection = (StatusCode, Json<ErrorBody>);

fn invalid(detail: String) -> Rejection {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: ErrorCode::InvalidRequest.to_string(),
            detail: Some(detail),
        }),
    )
}

fn internal(error: anyhow::Error) -> Rejection {
    error!("{:?}", error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new(ErrorCode::InvalidRequest)),
    )
}

/// `POST /delegations`: verify a submitted credential against its JWK and
/// upsert it by `(subject, agent_id, tool_id)`.
pub async fn submit_delegation_route(
    Extension(state): Extension<AuthorizerState>,
    Json(submission): Json<DelegationSubmission>,
) -> Result<Json<DelegationStored>, Rejection> {
    let credential = DelegationCredential::from_str(&submission.jws)
        .map_err(|error| invalid(error.to_string()))?;

    credential
        .verify(&submission.public_jwk, unix_now())
        .await
        .map_err(|error| {
            warn!("Refusing delegation submission: {}", error);
            invalid(error.to_string())
        })?;

    let claims = credential.claims();
    let record = DelegationRecord {
        subject: claims.subject.clone(),
        agent_id: claims.agent_id.clone(),
        tool_id: claims.tool_id.clone(),
        scopes: claims.scopes.clone(),
        not_after: claims.expires_at().unwrap_or_default(),
        issuer: claims.iss.clone(),
        envelope: credential.encoded().to_string(),
        jwk: submission.public_jwk,
        constraints: claims.constraints.clone(),
    };

    let key = record.key();
    state.store.upsert(&record).await.map_err(internal)?;

    info!(
        "Stored delegation {} -> {} on {} ({:?})",
        record.subject, record.agent_id, record.tool_id, record.scopes
    );

    Ok(Json(DelegationStored { stored: true, key }))
}

/// `GET /delegations`: every stored record.
pub async fn list_delegations_route(
    Extension(state): Extension<AuthorizerState>,
) -> Result<Json<Vec<DelegationRecord>>, Rejection> {
    Ok(Json(state.store.list().map_err(internal)?))
}

/// `DELETE /delegations/{subject}/{agent_id}/{tool_id}`.
pub async fn delete_delegation_route(
    Extension(state): Extension<AuthorizerState>,
    Path((subject, agent_id, tool_id)): Path<(String, String, String)>,
) -> Result<Json<Value>, Rejection> {
    let removed = state
        .store
        .remove(&subject, &agent_id, &tool_id)
        .await
        .map_err(internal)?;
    Ok(Json(json!({ "removed": removed })))
}

/// `POST /evaluate`: the gateway's policy question.
pub async fn evaluate_route(
    Extension(state): Extension<AuthorizerState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, Rejection> {
    let delegation = state
        .store
        .get(&request.subject, &request.agent_id, &request.tool_id)
        .map_err(internal)?;

    let response = policy::evaluate(delegation.as_ref(), &request, state.strict, unix_now());

    debug!(
        "Evaluated {}/{} on {}: allow={} scopes={:?}",
        request.subject, request.agent_id, request.tool_id, response.allow, response.scopes
    );

    Ok(Json(response))
}

/// `POST /consent`: can consent be granted without a human?
pub async fn consent_route(
    Extension(state): Extension<AuthorizerState>,
    Json(request): Json<ConsentRequest>,
) -> Result<Json<ConsentResponse>, Rejection> {
    let delegation = state
        .store
        .get(&request.subject, &request.agent_id, &request.tool_id)
        .map_err(internal)?;

    Ok(Json(policy::decide_consent(
        delegation.as_ref(),
        &request,
        unix_now(),
    )))
}
