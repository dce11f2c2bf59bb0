use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;

use waygate_core::api::IntrospectionResponse;
use waygate_core::error::{ErrorBody, ErrorCode};
use waygate_core::metadata::BearerChallenge;

use crate::server::ResourceState;

/// The identity a request proved by presenting an active bearer token with
/// the right audience. Handlers still check the scope a tool requires via
/// [BearerIdentity::require_scope].
pub struct BearerIdentity {
    /// The end user the token was issued for
    pub subject: String,
    /// The scopes the token carries
    pub scopes: Vec<String>,
}

impl BearerIdentity {
    /// Fail with `403 insufficient_scope` unless the token carries `scope`.
    pub fn require_scope(&self, scope: &str) -> Result<(), ResourceRejection> {
        if self.scopes.iter().any(|held| held == scope) {
            Ok(())
        } else {
            Err(ResourceRejection::InsufficientScope)
        }
    }
}

/// The ways bearer enforcement can refuse a request.
pub enum ResourceRejection {
    /// No usable `Authorization: Bearer` header; carries the challenge that
    /// points the caller at the PRM document
    Unauthenticated(BearerChallenge),
    /// Introspection said the token is not active
    InvalidToken,
    /// The token's `aud` is not this resource
    BadAudience,
    /// Introspection itself failed
    IntrospectionFailed,
    /// Active token, wrong scope
    InsufficientScope,
}

impl IntoResponse for ResourceRejection {
    fn into_response(self) -> Response {
        let (status, code, challenge) = match self {
            ResourceRejection::Unauthenticated(challenge) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::InvalidToken, Some(challenge))
            }
            ResourceRejection::InvalidToken => {
                (StatusCode::UNAUTHORIZED, ErrorCode::InvalidToken, None)
            }
            ResourceRejection::BadAudience => {
                (StatusCode::UNAUTHORIZED, ErrorCode::BadAudience, None)
            }
            ResourceRejection::IntrospectionFailed => {
                (StatusCode::UNAUTHORIZED, ErrorCode::IntrospectionFailed, None)
            }
            ResourceRejection::InsufficientScope => {
                (StatusCode::FORBIDDEN, ErrorCode::InsufficientScope, None)
            }
        };

        let mut response = (status, Json(ErrorBody::new(code))).into_response();

        if let Some(challenge) = challenge {
            if let Ok(value) = HeaderValue::from_str(&challenge.render()) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }

        response
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerIdentity
where
    S: Send + Sync,
{
    type Rejection = ResourceRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resource_state = parts
            .extensions
            .get::<ResourceState>()
            .cloned()
            .ok_or(ResourceRejection::IntrospectionFailed)?;

        let bearer = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                ResourceRejection::Unauthenticated(resource_state.challenge("missing bearer token"))
            })?;

        let introspection: IntrospectionResponse = resource_state
            .http
            .post(resource_state.config.introspection_url.clone())
            .form(&[("token", bearer.token())])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| {
                error!("Token introspection failed: {}", error);
                ResourceRejection::IntrospectionFailed
            })?
            .json()
            .await
            .map_err(|error| {
                error!("Unreadable introspection response: {}", error);
                ResourceRejection::IntrospectionFailed
            })?;

        if !introspection.active {
            debug!("Rejecting inactive token: {:?}", introspection.error);
            return Err(ResourceRejection::InvalidToken);
        }

        if introspection.aud.as_deref() != Some(resource_state.config.resource.as_str()) {
            warn!(
                "Rejecting token for foreign audience {:?} (expected {})",
                introspection.aud, resource_state.config.resource
            );
            return Err(ResourceRejection::BadAudience);
        }

        Ok(BearerIdentity {
            subject: introspection.sub.unwrap_or_default(),
            scopes: introspection
                .scope
                .unwrap_or_default()
                .split_ascii_whitespace()
                .map(String::from)
                .collect(),
        })
    }
}
