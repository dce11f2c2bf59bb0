use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{JwtSignatureAlgorithm, KeyMaterial, PublicJwk};

/// Tolerated clock skew when judging credential expiry, in seconds.
pub const CLOCK_SKEW_SECONDS: u64 = 5;

/// The ways a submitted delegation credential can be refused.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Not three base64url segments, or undecodable JSON inside them
    #[error("malformed credential")]
    Malformed,
    /// The `alg` header named something other than EdDSA, ES256 or RS256
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// The signature did not verify under the supplied key
    #[error("signature verification failed")]
    BadSignature,
    /// `not_after`/`exp` lies in the past (beyond clock skew)
    #[error("credential expired")]
    Expired,
    /// The claims decoded but fail shape rules
    #[error("invalid claims: {0}")]
    InvalidClaims(String),
    /// The supplied JWK cannot verify the named algorithm
    #[error("unusable verification key: {0}")]
    BadKey(String),
}

/// JOSE header of a delegation credential.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialHeader {
    #[allow(missing_docs)]
    pub alg: String,
    #[allow(missing_docs)]
    pub typ: String,
}

/// Constraints a user may attach to a delegation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegationConstraints {
    /// Hard ceiling on any single `amount_cents`; must be positive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount_cents: Option<u64>,
    /// Closed set of merchant IDs the agent may transact with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchants: Option<Vec<String>>,
    /// Obligation lifetime in seconds, overriding the evaluator's default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

/// The claims of a delegation credential: a user (`subject`) authorizes an
/// agent to exercise `scopes` on a tool until `not_after`/`exp`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegationClaims {
    /// The delegating user
    #[serde(alias = "sub")]
    pub subject: String,
    /// The agent being delegated to
    pub agent_id: String,
    #[allow(missing_docs)]
    pub tool_id: String,
    #[allow(missing_docs)]
    pub scopes: Vec<String>,
    /// Absolute expiry, unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_after: Option<u64>,
    /// JWT-style alias for `not_after`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    /// Who minted the credential
    pub iss: String,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<DelegationConstraints>,
}

impl DelegationClaims {
    /// The effective expiry: `not_after` wins over `exp`.
    pub fn expires_at(&self) -> Option<u64> {
        self.not_after.or(self.exp)
    }

    /// Shape rules beyond what serde enforces.
    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.subject.is_empty() || self.agent_id.is_empty() || self.tool_id.is_empty() {
            return Err(CredentialError::InvalidClaims(
                "subject, agent_id and tool_id are required".into(),
            ));
        }

        if self.scopes.is_empty() {
            return Err(CredentialError::InvalidClaims(
                "a delegation must carry at least one scope".into(),
            ));
        }

        if self.expires_at().is_none() {
            return Err(CredentialError::InvalidClaims(
                "one of not_after or exp is required".into(),
            ));
        }

        if let Some(constraints) = &self.constraints {
            if constraints.max_amount_cents == Some(0) {
                return Err(CredentialError::InvalidClaims(
                    "max_amount_cents must be positive".into(),
                ));
            }
        }

        Ok(())
    }
}

/// A parsed (but not yet verified) compact delegation credential.
#[derive(Clone, Debug)]
pub struct DelegationCredential {
    header: CredentialHeader,
    claims: DelegationClaims,
    signed_data: Vec<u8>,
    signature: Vec<u8>,
    encoded: String,
}

fn base64url() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
}

impl FromStr for DelegationCredential {
    type Err = CredentialError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let mut segments = token.split('.');
        let (header_part, claims_part, signature_part) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(header), Some(claims), Some(signature), None) => (header, claims, signature),
                _ => return Err(CredentialError::Malformed),
            };

        let header_json = base64url()
            .decode(header_part)
            .map_err(|_| CredentialError::Malformed)?;
        let claims_json = base64url()
            .decode(claims_part)
            .map_err(|_| CredentialError::Malformed)?;
        let signature = base64url()
            .decode(signature_part)
            .map_err(|_| CredentialError::Malformed)?;

        let header: CredentialHeader =
            serde_json::from_slice(&header_json).map_err(|_| CredentialError::Malformed)?;
        let claims: DelegationClaims =
            serde_json::from_slice(&claims_json).map_err(|_| CredentialError::Malformed)?;

        Ok(DelegationCredential {
            header,
            claims,
            signed_data: format!("{}.{}", header_part, claims_part).into_bytes(),
            signature,
            encoded: token.to_string(),
        })
    }
}

impl DelegationCredential {
    /// The credential's claims. Meaningless until [DelegationCredential::verify]
    /// has succeeded.
    pub fn claims(&self) -> &DelegationClaims {
        &self.claims
    }

    /// The compact form this credential was parsed from.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// The algorithm named in the header.
    pub fn algorithm(&self) -> Result<JwtSignatureAlgorithm, CredentialError> {
        JwtSignatureAlgorithm::from_str(&self.header.alg)
            .map_err(|_| CredentialError::UnsupportedAlgorithm(self.header.alg.clone()))
    }

    /// Verify signature, expiry (with ±[CLOCK_SKEW_SECONDS]) and claim shape
    /// against the supplied public JWK.
    pub async fn verify(&self, jwk: &PublicJwk, now: u64) -> Result<(), CredentialError> {
        let algorithm = self.algorithm()?;
        let key = jwk.to_key_material(algorithm)?;

        key.verify(&self.signed_data, &self.signature)
            .await
            .map_err(|error| {
                warn!("Credential signature did not verify: {:?}", error);
                CredentialError::BadSignature
            })?;

        self.claims.validate()?;

        match self.claims.expires_at() {
            Some(expires_at) if expires_at + CLOCK_SKEW_SECONDS < now => {
                Err(CredentialError::Expired)
            }
            Some(_) => Ok(()),
            None => Err(CredentialError::InvalidClaims(
                "one of not_after or exp is required".into(),
            )),
        }
    }

    /// Mint a compact credential over `claims` with the given signing key.
    pub async fn issue(claims: &DelegationClaims, key: &dyn KeyMaterial) -> anyhow::Result<String> {
        let header = CredentialHeader {
            alg: key.jwt_algorithm_name(),
            typ: "JWT".into(),
        };

        let header_part = base64url().encode(serde_json::to_vec(&header)?);
        let claims_part = base64url().encode(serde_json::to_vec(claims)?);
        let signed_data = format!("{}.{}", header_part, claims_part);
        let signature = key.sign(signed_data.as_bytes()).await?;

        Ok(format!("{}.{}", signed_data, base64url().encode(signature)))
    }
}
