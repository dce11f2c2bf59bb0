//! Compact HS256 access tokens.
//!
//! The tokens this server mints are ordinary three-segment JWTs, MAC'd with
//! a process secret. Verification happens either here (introspection) or at
//! a resource server configured with the same secret.

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use waygate_core::time::unix_now;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of every minted access token.
pub const ACCESS_TOKEN_LIFETIME_SECONDS: u64 = 900;

/// Claims carried by an access token.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    #[allow(missing_docs)]
    pub iss: String,
    #[allow(missing_docs)]
    pub sub: String,
    /// Space-joined granted scopes
    pub scope: String,
    /// The resource indicator the token was bound to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[allow(missing_docs)]
    pub iat: u64,
    #[allow(missing_docs)]
    pub exp: u64,
    /// Unique token identifier
    pub jti: String,
}

/// The ways a presented access token can fail verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenVerifyError {
    #[allow(missing_docs)]
    #[error("malformed token")]
    Malformed,
    #[allow(missing_docs)]
    #[error("signature verification failed")]
    BadSignature,
    #[allow(missing_docs)]
    #[error("unexpected issuer")]
    BadIssuer,
    #[allow(missing_docs)]
    #[error("token expired")]
    Expired,
}

#[derive(Serialize, Deserialize)]
struct JoseHeader {
    alg: String,
    typ: String,
}

fn base64url() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
}

/// Mint a compact HS256 token over `claims`.
pub fn mint_access_token(claims: &AccessClaims, secret: &[u8]) -> anyhow::Result<String> {
    let header = JoseHeader {
        alg: "HS256".into(),
        typ: "JWT".into(),
    };

    let signed_data = format!(
        "{}.{}",
        base64url().encode(serde_json::to_vec(&header)?),
        base64url().encode(serde_json::to_vec(claims)?)
    );

    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(signed_data.as_bytes());
    let tag = mac.finalize().into_bytes();

    Ok(format!("{}.{}", signed_data, base64url().encode(tag)))
}

/// Verify signature, issuer and expiry of a compact HS256 token.
pub fn verify_access_token(
    token: &str,
    secret: &[u8],
    issuer: &str,
) -> Result<AccessClaims, TokenVerifyError> {
    let mut segments = token.split('.');
    let (header_part, claims_part, tag_part) =
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(header), Some(claims), Some(tag), None) => (header, claims, tag),
            _ => return Err(TokenVerifyError::Malformed),
        };

    let header_json = base64url()
        .decode(header_part)
        .map_err(|_| TokenVerifyError::Malformed)?;
    let header: JoseHeader =
        serde_json::from_slice(&header_json).map_err(|_| TokenVerifyError::Malformed)?;
    if header.alg != "HS256" {
        return Err(TokenVerifyError::Malformed);
    }

    let tag = base64url()
        .decode(tag_part)
        .map_err(|_| TokenVerifyError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| TokenVerifyError::BadSignature)?;
    mac.update(format!("{}.{}", header_part, claims_part).as_bytes());
    mac.verify_slice(&tag)
        .map_err(|_| TokenVerifyError::BadSignature)?;

    let claims_json = base64url()
        .decode(claims_part)
        .map_err(|_| TokenVerifyError::Malformed)?;
    let claims: AccessClaims =
        serde_json::from_slice(&claims_json).map_err(|_| TokenVerifyError::Malformed)?;

    if claims.iss != issuer {
        return Err(TokenVerifyError::BadIssuer);
    }

    if claims.exp <= unix_now() {
        return Err(TokenVerifyError::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-signing-secret";
    const ISSUER: &str = "http://as.test";

    fn claims() -> AccessClaims {
        AccessClaims {
            iss: ISSUER.into(),
            sub: "user-123".into(),
            scope: "echo:read".into(),
            aud: Some("http://rs.test/mcp".into()),
            iat: unix_now(),
            exp: unix_now() + ACCESS_TOKEN_LIFETIME_SECONDS,
            jti: "token-1".into(),
        }
    }

    #[test]
    fn it_round_trips_a_minted_token() {
        let token = mint_access_token(&claims(), SECRET).unwrap();
        assert_eq!(verify_access_token(&token, SECRET, ISSUER).unwrap(), claims());
    }

    #[test]
    fn it_rejects_a_tampered_scope() {
        let token = mint_access_token(&claims(), SECRET).unwrap();
        let mut segments: Vec<String> = token.split('.').map(String::from).collect();

        let escalated = AccessClaims {
            scope: "payments:charge".into(),
            ..claims()
        };
        segments[1] = base64url().encode(serde_json::to_vec(&escalated).unwrap());

        assert_eq!(
            verify_access_token(&segments.join("."), SECRET, ISSUER),
            Err(TokenVerifyError::BadSignature)
        );
    }

    #[test]
    fn it_rejects_the_wrong_issuer_and_expired_tokens() {
        let token = mint_access_token(&claims(), SECRET).unwrap();
        assert_eq!(
            verify_access_token(&token, SECRET, "http://impostor.test"),
            Err(TokenVerifyError::BadIssuer)
        );

        let stale = AccessClaims {
            exp: unix_now() - 1,
            ..claims()
        };
        let token = mint_access_token(&stale, SECRET).unwrap();
        assert_eq!(
            verify_access_token(&token, SECRET, ISSUER),
            Err(TokenVerifyError::Expired)
        );
    }
}
