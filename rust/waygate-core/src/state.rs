//! The signed state envelope the gateway threads through the OAuth
//! authorization request.
//!
//! The envelope binds the OAuth `state` parameter to a specific gateway
//! session: its payload carries the session ID, issue time, audience, scope
//! string, a nonce and a digest of the agent-supplied context. The envelope
//! is `base64url(payload_json) "." base64url(tag)` where the tag is an
//! HMAC-SHA256 over the payload bytes, keyed by a gateway-process secret.
//! Verification is constant time in the tag comparison.

use std::collections::BTreeMap;

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// The payload bound into the signed OAuth `state` parameter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatePayload {
    /// Gateway session ID
    pub sid: String,
    /// Issue time, unix seconds
    pub iat: u64,
    /// Audience (resource identifier) the session was opened for
    pub aud: String,
    /// Space-joined scope string the session will request
    pub scope: String,
    /// Session nonce
    pub n: String,
    /// Digest of the agent-supplied context
    pub ctx_digest: String,
}

/// The ways a presented state token can fail verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// The token was not two base64url segments joined by a dot
    #[error("malformed_state")]
    MalformedState,
    /// The payload did not decode to a [StatePayload]
    #[error("bad_payload")]
    BadPayload,
    /// The HMAC tag did not verify
    #[error("bad_signature")]
    BadSignature,
}

fn base64url() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
}

/// Sign a [StatePayload] into a compact state token.
pub fn sign_state(payload: &StatePayload, secret: &[u8]) -> anyhow::Result<String> {
    let payload_json = serde_json::to_vec(payload)?;
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(&payload_json);
    let tag = mac.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        base64url().encode(payload_json),
        base64url().encode(tag)
    ))
}

/// Verify a compact state token and recover its payload.
///
/// The tag comparison happens inside [Mac::verify_slice], which is constant
/// time over the tag bytes.
pub fn verify_state(token: &str, secret: &[u8]) -> Result<StatePayload, StateError> {
    let (payload_part, tag_part) = token.split_once('.').ok_or(StateError::MalformedState)?;

    if payload_part.is_empty() || tag_part.contains('.') {
        return Err(StateError::MalformedState);
    }

    let payload_json = base64url()
        .decode(payload_part)
        .map_err(|_| StateError::MalformedState)?;
    let tag = base64url()
        .decode(tag_part)
        .map_err(|_| StateError::MalformedState)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| StateError::BadSignature)?;
    mac.update(&payload_json);
    mac.verify_slice(&tag)
        .map_err(|_| StateError::BadSignature)?;

    serde_json::from_slice(&payload_json).map_err(|_| StateError::BadPayload)
}

/// Digest an agent-supplied context map into a short stable hex string.
///
/// Keys are sorted before hashing so the digest does not depend on the
/// order the agent happened to serialize its JSON in.
pub fn context_digest(context: &serde_json::Map<String, Value>) -> String {
    let ordered: BTreeMap<&String, &Value> = context.iter().collect();
    let canonical = serde_json::to_vec(&ordered).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    digest
        .iter()
        .take(16)
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &[u8] = b"it's a secret to everybody";

    fn fixture() -> StatePayload {
        StatePayload {
            sid: "0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f".into(),
            iat: 1_700_000_000,
            aud: "https://rs.test/mcp".into(),
            scope: "echo:read".into(),
            n: "nonce-1".into(),
            ctx_digest: context_digest(&serde_json::Map::new()),
        }
    }

    #[test]
    fn it_round_trips_a_signed_payload() {
        let payload = fixture();
        let token = sign_state(&payload, SECRET).unwrap();
        assert_eq!(verify_state(&token, SECRET).unwrap(), payload);
    }

    #[test]
    fn it_rejects_a_tampered_payload() {
        let token = sign_state(&fixture(), SECRET).unwrap();
        let (_, tag_part) = token.split_once('.').unwrap();

        let forged = StatePayload {
            scope: "payments:charge".into(),
            ..fixture()
        };
        let forged_json = serde_json::to_vec(&forged).unwrap();
        let forged_token = format!("{}.{}", base64url().encode(forged_json), tag_part);

        assert_eq!(
            verify_state(&forged_token, SECRET),
            Err(StateError::BadSignature)
        );
    }

    #[test]
    fn it_rejects_the_wrong_secret() {
        let token = sign_state(&fixture(), SECRET).unwrap();
        assert_eq!(
            verify_state(&token, b"some other secret"),
            Err(StateError::BadSignature)
        );
    }

    #[test]
    fn it_classifies_malformed_tokens() {
        assert_eq!(
            verify_state("no-dot-here", SECRET),
            Err(StateError::MalformedState)
        );
        assert_eq!(
            verify_state("a.b.c", SECRET),
            Err(StateError::MalformedState)
        );
        assert_eq!(
            verify_state("!!!.???", SECRET),
            Err(StateError::MalformedState)
        );
    }

    #[test]
    fn it_classifies_a_valid_tag_over_garbage_payload() {
        let garbage = b"[1,2,3]";
        let mut mac = HmacSha256::new_from_slice(SECRET).unwrap();
        mac.update(garbage);
        let tag = mac.finalize().into_bytes();
        let token = format!(
            "{}.{}",
            base64url().encode(garbage),
            base64url().encode(tag)
        );
        assert_eq!(verify_state(&token, SECRET), Err(StateError::BadPayload));
    }

    #[test]
    fn context_digest_is_order_insensitive() {
        let mut first = serde_json::Map::new();
        first.insert("orderId".into(), json!("order-1001"));
        first.insert("amount_cents".into(), json!(1200));

        let mut second = serde_json::Map::new();
        second.insert("amount_cents".into(), json!(1200));
        second.insert("orderId".into(), json!("order-1001"));

        assert_eq!(context_digest(&first), context_digest(&second));

        let mut third = first.clone();
        third.insert("merchant_id".into(), json!("mcp-tix"));
        assert_ne!(context_digest(&first), context_digest(&third));
    }
}
