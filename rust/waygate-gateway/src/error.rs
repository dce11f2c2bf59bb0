use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use waygate_core::error::{ErrorBody, ErrorCode};

/// The gateway's JSON error response: a stable machine-readable code plus
/// an optional detail string. Raw upstream bodies only ever appear in the
/// detail when debug mode is on, and tokens never appear at all.
pub struct GatewayErrorResponse(pub StatusCode, pub ErrorBody);

impl IntoResponse for GatewayErrorResponse {
    fn into_response(self) -> axum::response::Response {
        (self.0, Json(self.1)).into_response()
    }
}

impl From<anyhow::Error> for GatewayErrorResponse {
    fn from(value: anyhow::Error) -> Self {
        error!("{:?}", value);
        GatewayErrorResponse(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new(ErrorCode::InvalidRequest),
        )
    }
}

impl GatewayErrorResponse {
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        GatewayErrorResponse(
            StatusCode::BAD_REQUEST,
            ErrorBody::with_detail(ErrorCode::InvalidRequest, detail),
        )
    }

    pub fn denied_by_policy(reason: Option<String>) -> Self {
        GatewayErrorResponse(
            StatusCode::FORBIDDEN,
            ErrorBody {
                error: ErrorCode::DeniedByPolicy.to_string(),
                detail: reason,
            },
        )
    }

    pub fn login_required() -> Self {
        GatewayErrorResponse(
            StatusCode::UNAUTHORIZED,
            ErrorBody::new(ErrorCode::LoginRequired),
        )
    }

    pub fn obligation_violation(detail: &str) -> Self {
        GatewayErrorResponse(
            StatusCode::FORBIDDEN,
            ErrorBody::with_detail(ErrorCode::ObligationViolation, detail),
        )
    }

    pub fn obligation_ttl_expired() -> Self {
        GatewayErrorResponse(
            StatusCode::UNAUTHORIZED,
            ErrorBody::new(ErrorCode::SessionObligationTtlExpired),
        )
    }

    pub fn bad_gateway(detail: Option<String>) -> Self {
        GatewayErrorResponse(
            StatusCode::BAD_GATEWAY,
            ErrorBody {
                error: ErrorCode::BadGateway.to_string(),
                detail,
            },
        )
    }

    pub fn start_failed(detail: Option<String>) -> Self {
        GatewayErrorResponse(
            StatusCode::BAD_GATEWAY,
            ErrorBody {
                error: ErrorCode::StartFailed.to_string(),
                detail,
            },
        )
    }
}
