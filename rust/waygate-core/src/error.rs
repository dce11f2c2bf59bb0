//! Stable machine-readable error codes shared by every Waygate boundary.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Every error that crosses a Waygate service boundary is reported with one
/// of these codes. The string form (snake_case) is the wire format.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    /// A required parameter was missing or unparseable
    InvalidRequest,
    /// The authorizer evaluated the request and said no
    DeniedByPolicy,
    /// No ready session holds the scope a tool requires
    LoginRequired,
    /// A per-request obligation (order binding, amount cap, merchant list)
    /// was breached
    ObligationViolation,
    /// The obligations attached to a session aged past their ttl
    SessionObligationTtlExpired,
    /// The authorization code was unknown, spent, or bound to another client
    InvalidGrant,
    /// The PKCE verifier did not hash to the stored challenge
    BadPkce,
    /// A token was presented to a resource it was not issued for
    BadAudience,
    /// The token is valid but does not carry the required scope
    InsufficientScope,
    /// The upstream hop failed at the TCP or HTTP layer
    BadGateway,
    /// The authorization server could not introspect the token
    IntrospectionFailed,
    /// Discovery failed on both the probe and the configured fallback
    StartFailed,
    /// The bearer token failed signature or issuer checks
    InvalidToken,
    /// Consent requires an explicit approval step
    ExplicitRequired,
}

/// The JSON body carried alongside a non-2xx status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// One of the [ErrorCode] strings
    pub error: String,
    /// Optional human-oriented elaboration; upstream bodies appear here only
    /// in debug modes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorBody {
    /// An [ErrorBody] carrying just a code.
    pub fn new(code: ErrorCode) -> Self {
        ErrorBody {
            error: code.to_string(),
            detail: None,
        }
    }

    /// An [ErrorBody] carrying a code and a detail string.
    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        ErrorBody {
            error: code.to_string(),
            detail: Some(detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_as_snake_case() {
        assert_eq!(ErrorCode::DeniedByPolicy.to_string(), "denied_by_policy");
        assert_eq!(
            ErrorCode::SessionObligationTtlExpired.to_string(),
            "session_obligation_ttl_expired"
        );
        assert_eq!(ErrorCode::BadPkce.to_string(), "bad_pkce");
    }

    #[test]
    fn detail_is_omitted_when_absent() {
        let body = serde_json::to_string(&ErrorBody::new(ErrorCode::LoginRequired)).unwrap();
        assert_eq!(body, r#"{"error":"login_required"}"#);
    }
}
