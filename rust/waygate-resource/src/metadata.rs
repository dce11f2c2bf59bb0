use axum::{Extension, Json};

use waygate_core::metadata::ProtectedResourceMetadata;

use crate::server::ResourceState;

/// `GET /.well-known/oauth-protected-resource` (RFC 9728).
pub async fn metadata_route(
    Extension(state): Extension<ResourceState>,
) -> Json<ProtectedResourceMetadata> {
    let config = &state.config;

    Json(ProtectedResourceMetadata {
        resource: config.resource.clone(),
        authorization_servers: config.authorization_servers.clone(),
        scopes_supported: config.scopes_supported.clone(),
        introspection_endpoint: Some(config.introspection_url.to_string()),
    })
}
