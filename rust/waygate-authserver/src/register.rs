use axum::http::StatusCode;
use axum::{Extension, Json};

use waygate_core::api::{RegistrationRequest, RegistrationResponse};
use waygate_core::entropy::random_hex;
use waygate_core::error::{ErrorBody, ErrorCode};

use crate::server::{AuthServerState, RegisteredClient};

/// `POST /register` (RFC 7591), public-client profile: no secret is ever
/// issued and the token endpoint requires no client authentication.
pub async fn register_route(
    Extension(state): Extension<AuthServerState>,
    Json(request): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), (StatusCode, Json<ErrorBody>)> {
    if request.redirect_uris.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::with_detail(
                ErrorCode::InvalidRequest,
                "redirect_uris must not be empty",
            )),
        ));
    }

    let client_id = format!("client-{}", random_hex(8));
    let client = RegisteredClient {
        client_id: client_id.clone(),
        redirect_uris: request.redirect_uris.clone(),
        client_name: request.client_name.clone(),
    };

    state.clients.write().await.insert(client_id.clone(), client);

    debug!("Registered public client {}", client_id);

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            client_id,
            redirect_uris: request.redirect_uris,
            client_name: request.client_name,
            token_endpoint_auth_method: "none".into(),
        }),
    ))
}
