use axum::{Extension, Form, Json};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::Deserialize;

use waygate_core::api::IntrospectionResponse;

use crate::jwt::verify_access_token;
use crate::server::AuthServerState;

#[derive(Debug, Default, Deserialize)]
pub struct IntrospectForm {
    pub token: Option<String>,
}

/// `POST /introspect` (RFC 7662). The token may arrive in the form body or
/// as a bearer header; inactive tokens are reported as `active: false`
/// rather than an error status.
pub async fn introspect_route(
    Extension(state): Extension<AuthServerState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    form: Option<Form<IntrospectForm>>,
) -> Json<IntrospectionResponse> {
    let token = form
        .and_then(|Form(form)| form.token)
        .or_else(|| bearer.map(|TypedHeader(Authorization(bearer))| bearer.token().to_string()));

    let Some(token) = token else {
        return Json(IntrospectionResponse {
            active: false,
            error: Some("no token presented".into()),
            ..Default::default()
        });
    };

    match verify_access_token(
        &token,
        state.config.signing_secret.as_bytes(),
        &state.config.issuer_id(),
    ) {
        Ok(claims) => Json(IntrospectionResponse {
            active: true,
            scope: Some(claims.scope),
            sub: Some(claims.sub),
            aud: claims.aud,
            iss: Some(claims.iss),
            iat: Some(claims.iat),
            exp: Some(claims.exp),
            token_type: Some("Bearer".into()),
            error: None,
        }),
        Err(error) => {
            debug!("Introspection declined a token: {}", error);
            Json(IntrospectionResponse {
                active: false,
                error: Some(error.to_string()),
                ..Default::default()
            })
        }
    }
}
