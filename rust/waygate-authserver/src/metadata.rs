use axum::{Extension, Json};

use waygate_core::metadata::AuthorizationServerMetadata;

use crate::server::AuthServerState;

/// `GET /.well-known/oauth-authorization-server` (RFC 8414).
pub async fn metadata_route(
    Extension(state): Extension<AuthServerState>,
) -> Json<AuthorizationServerMetadata> {
    let config = &state.config;

    Json(AuthorizationServerMetadata {
        issuer: config.issuer_id(),
        authorization_endpoint: config.endpoint("/authorize"),
        token_endpoint: config.endpoint("/token"),
        introspection_endpoint: Some(config.endpoint("/introspect")),
        registration_endpoint: Some(config.endpoint("/register")),
        code_challenge_methods_supported: vec!["S256".into()],
        scopes_supported: config.scopes_supported.clone(),
        token_endpoint_auth_methods_supported: vec!["none".into()],
        response_types_supported: vec!["code".into()],
        grant_types_supported: vec!["authorization_code".into()],
    })
}
