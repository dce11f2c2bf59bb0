use axum::http::StatusCode;
use axum::{Extension, Form, Json};

use waygate_core::api::{TokenRequestForm, TokenResponse};
use waygate_core::entropy::random_hex;
use waygate_core::error::{ErrorBody, ErrorCode};
use waygate_core::pkce::s256_challenge;
use waygate_core::time::unix_now;

use crate::jwt::{mint_access_token, AccessClaims, ACCESS_TOKEN_LIFETIME_SECONDS};
use crate::server::AuthServerState;

type TokenRejection = (StatusCode, Json<ErrorBody>);

fn reject(code: ErrorCode, detail: &str) -> TokenRejection {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::with_detail(code, detail)),
    )
}

/// `POST /token`: redeem an authorization code for an HS256 access token.
///
/// The code lookup is a remove-under-write-lock, so a code can be redeemed
/// exactly once no matter how many exchanges race; every failure after the
/// removal leaves the code burned.
pub async fn token_route(
    Extension(state): Extension<AuthServerState>,
    Form(form): Form<TokenRequestForm>,
) -> Result<Json<TokenResponse>, TokenRejection> {
    if form.grant_type != "authorization_code" {
        return Err(reject(
            ErrorCode::InvalidRequest,
            "only authorization_code is supported",
        ));
    }

    let request = state
        .codes
        .write()
        .await
        .remove(&form.code)
        .ok_or_else(|| reject(ErrorCode::InvalidGrant, "unknown or already-redeemed code"))?;

    if request.client_id != form.client_id {
        warn!("Code redemption by the wrong client ({})", form.client_id);
        return Err(reject(ErrorCode::InvalidGrant, "client_id mismatch"));
    }

    if request.redirect_uri != form.redirect_uri {
        return Err(reject(ErrorCode::InvalidGrant, "redirect_uri mismatch"));
    }

    if s256_challenge(&form.code_verifier) != request.code_challenge {
        warn!("PKCE verifier mismatch for client {}", form.client_id);
        return Err(reject(ErrorCode::BadPkce, "code_verifier does not match"));
    }

    // Audience precedence: token-request resource, then the one presented at
    // /authorize, then the configured default.
    let audience = form
        .resource
        .or(request.resource_indicator)
        .or_else(|| state.config.default_audience.clone());

    let now = unix_now();
    let claims = AccessClaims {
        iss: state.config.issuer_id(),
        sub: state.config.demo_subject.clone(),
        scope: request.scope.clone(),
        aud: audience,
        iat: now,
        exp: now + ACCESS_TOKEN_LIFETIME_SECONDS,
        jti: format!("jwt-{}", random_hex(8)),
    };

    let access_token = mint_access_token(&claims, state.config.signing_secret.as_bytes())
        .map_err(|error| {
            error!("Could not mint access token: {}", error);
            reject(ErrorCode::InvalidRequest, "token minting failed")
        })?;

    debug!(
        "Issued token {} for {} (aud {:?})",
        claims.jti, claims.sub, claims.aud
    );

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".into(),
        expires_in: Some(ACCESS_TOKEN_LIFETIME_SECONDS),
        scope: Some(request.scope),
        refresh_token: None,
    }))
}
