//! Proof-key-for-code-exchange (RFC 7636), S256 only.

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entropy::random_urlsafe;

/// A PKCE verifier/challenge pair. The verifier stays inside the gateway
/// process until the token exchange and is erased afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PkcePair {
    /// 256 bits of randomness, base64url
    pub verifier: String,
    /// `base64url(sha256(verifier))`
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair.
    pub fn generate() -> Self {
        let verifier = random_urlsafe(32);
        let challenge = s256_challenge(&verifier);
        PkcePair {
            verifier,
            challenge,
        }
    }
}

/// Compute the S256 challenge for a verifier.
pub fn s256_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_challenge_matches_the_rfc_7636_test_vector() {
        // Appendix B of RFC 7636
        assert_eq!(
            s256_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn generated_pairs_are_self_consistent_and_distinct() {
        let pair = PkcePair::generate();
        assert_eq!(pair.challenge, s256_challenge(&pair.verifier));
        assert_eq!(pair.verifier.len(), 43);
        assert_ne!(pair.verifier, PkcePair::generate().verifier);
    }
}
