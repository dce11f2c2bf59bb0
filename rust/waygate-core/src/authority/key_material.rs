use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use ed25519_zebra::{
    Signature as Ed25519Signature, SigningKey as Ed25519PrivateKey,
    VerificationKey as Ed25519PublicKey,
};
use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature as P256Signature, SigningKey as P256PrivateKey, VerifyingKey as P256PublicKey,
};
use rsa::{
    traits::PublicKeyParts, BigUint, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum_macros::{Display, EnumString};

use super::CredentialError;

/// The JWS algorithms a delegation credential may be signed with.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
pub enum JwtSignatureAlgorithm {
    /// Ed25519
    EdDSA,
    /// ECDSA over NIST P-256 with SHA-256
    ES256,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    RS256,
}

/// Anything that can sign and verify JWS payloads under a named algorithm.
#[async_trait]
pub trait KeyMaterial: Send + Sync {
    /// The `alg` header value this key signs under
    fn jwt_algorithm_name(&self) -> String;

    /// Sign `payload`, returning the raw JWS signature bytes
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Verify that `signature` covers `payload`
    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()>;
}

/// A public verification key in JWK form, as submitted alongside a
/// delegation. Only the members for the three supported key types exist.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicJwk {
    /// `OKP`, `EC` or `RSA`
    pub kty: String,
    /// `Ed25519` or `P-256`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Curve point / public key, base64url
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// P-256 y coordinate, base64url
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// RSA modulus, base64url big-endian
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent, base64url big-endian
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

fn base64url() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
}

fn decode_member(jwk: &PublicJwk, member: Option<&String>, name: &str) -> Result<Vec<u8>, CredentialError> {
    let value = member.ok_or_else(|| {
        CredentialError::BadKey(format!("{} key missing `{}`", jwk.kty, name))
    })?;
    base64url()
        .decode(value)
        .map_err(|_| CredentialError::BadKey(format!("`{}` is not base64url", name)))
}

impl PublicJwk {
    /// Reify this JWK into verification-only [KeyMaterial] for the given
    /// algorithm. The key type and algorithm must agree.
    pub fn to_key_material(
        &self,
        algorithm: JwtSignatureAlgorithm,
    ) -> Result<Box<dyn KeyMaterial>, CredentialError> {
        match (algorithm, self.kty.as_str()) {
            (JwtSignatureAlgorithm::EdDSA, "OKP") => {
                let x = decode_member(self, self.x.as_ref(), "x")?;
                let public_key = Ed25519PublicKey::try_from(x.as_slice())
                    .map_err(|error| CredentialError::BadKey(format!("{:?}", error)))?;
                Ok(Box::new(Ed25519KeyMaterial(public_key, None)))
            }
            (JwtSignatureAlgorithm::ES256, "EC") => {
                let x = decode_member(self, self.x.as_ref(), "x")?;
                let y = decode_member(self, self.y.as_ref(), "y")?;
                if x.len() != 32 || y.len() != 32 {
                    return Err(CredentialError::BadKey(
                        "P-256 coordinates must be 32 bytes".into(),
                    ));
                }
                let point = p256::EncodedPoint::from_affine_coordinates(
                    p256::FieldBytes::from_slice(&x),
                    p256::FieldBytes::from_slice(&y),
                    false,
                );
                let public_key = P256PublicKey::from_encoded_point(&point)
                    .map_err(|error| CredentialError::BadKey(format!("{:?}", error)))?;
                Ok(Box::new(P256KeyMaterial(public_key, None)))
            }
            (JwtSignatureAlgorithm::RS256, "RSA") => {
                let n = decode_member(self, self.n.as_ref(), "n")?;
                let e = decode_member(self, self.e.as_ref(), "e")?;
                let public_key = RsaPublicKey::new(
                    BigUint::from_bytes_be(&n),
                    BigUint::from_bytes_be(&e),
                )
                .map_err(|error| CredentialError::BadKey(format!("{}", error)))?;
                Ok(Box::new(RsaKeyMaterial(public_key, None)))
            }
            (algorithm, kty) => Err(CredentialError::BadKey(format!(
                "key type {} cannot verify {}",
                kty, algorithm
            ))),
        }
    }
}

/// Ed25519 key material (`alg: EdDSA`, `kty: OKP`).
#[derive(Clone)]
pub struct Ed25519KeyMaterial(pub Ed25519PublicKey, pub Option<Ed25519PrivateKey>);

impl Ed25519KeyMaterial {
    /// Generate a fresh signing key.
    pub fn generate() -> Self {
        let private_key = Ed25519PrivateKey::new(rand::thread_rng());
        let public_key = Ed25519PublicKey::from(&private_key);
        Ed25519KeyMaterial(public_key, Some(private_key))
    }

    /// The public half, as a JWK.
    pub fn public_jwk(&self) -> PublicJwk {
        let bytes: [u8; 32] = self.0.into();
        PublicJwk {
            kty: "OKP".into(),
            crv: Some("Ed25519".into()),
            x: Some(base64url().encode(bytes)),
            y: None,
            n: None,
            e: None,
        }
    }
}

#[async_trait]
impl KeyMaterial for Ed25519KeyMaterial {
    fn jwt_algorithm_name(&self) -> String {
        JwtSignatureAlgorithm::EdDSA.to_string()
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        match self.1 {
            Some(ref private_key) => {
                let signature = private_key.sign(payload);
                let bytes: [u8; 64] = signature.into();
                Ok(bytes.to_vec())
            }
            None => Err(anyhow!("No private key; cannot sign data")),
        }
    }

    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()> {
        let signature = Ed25519Signature::try_from(signature)?;
        self.0
            .verify(&signature, payload)
            .map_err(|error| anyhow!("Could not verify signature: {:?}", error))
    }
}

/// NIST P-256 key material (`alg: ES256`, `kty: EC`).
#[derive(Clone)]
pub struct P256KeyMaterial(pub P256PublicKey, pub Option<P256PrivateKey>);

impl P256KeyMaterial {
    /// Generate a fresh signing key.
    pub fn generate() -> Self {
        let private_key = P256PrivateKey::random(&mut p256::elliptic_curve::rand_core::OsRng);
        let public_key = P256PublicKey::from(&private_key);
        P256KeyMaterial(public_key, Some(private_key))
    }

    /// The public half, as a JWK.
    pub fn public_jwk(&self) -> PublicJwk {
        let point = self.0.to_encoded_point(false);
        PublicJwk {
            kty: "EC".into(),
            crv: Some("P-256".into()),
            x: point.x().map(|x| base64url().encode(x)),
            y: point.y().map(|y| base64url().encode(y)),
            n: None,
            e: None,
        }
    }
}

#[async_trait]
impl KeyMaterial for P256KeyMaterial {
    fn jwt_algorithm_name(&self) -> String {
        JwtSignatureAlgorithm::ES256.to_string()
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        match self.1 {
            Some(ref private_key) => {
                let signature: P256Signature = private_key.sign(payload);
                Ok(signature.to_vec())
            }
            None => Err(anyhow!("No private key; cannot sign data")),
        }
    }

    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()> {
        let signature = P256Signature::try_from(signature)?;
        self.0
            .verify(payload, &signature)
            .map_err(|error| anyhow!("Could not verify signature: {:?}", error))
    }
}

/// RSA key material (`alg: RS256`, `kty: RSA`).
#[derive(Clone)]
pub struct RsaKeyMaterial(pub RsaPublicKey, pub Option<RsaPrivateKey>);

impl RsaKeyMaterial {
    /// The public half, as a JWK.
    pub fn public_jwk(&self) -> PublicJwk {
        PublicJwk {
            kty: "RSA".into(),
            crv: None,
            x: None,
            y: None,
            n: Some(base64url().encode(self.0.n().to_bytes_be())),
            e: Some(base64url().encode(self.0.e().to_bytes_be())),
        }
    }
}

#[async_trait]
impl KeyMaterial for RsaKeyMaterial {
    fn jwt_algorithm_name(&self) -> String {
        JwtSignatureAlgorithm::RS256.to_string()
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        let hashed = hasher.finalize();

        match &self.1 {
            Some(private_key) => {
                let padding = Pkcs1v15Sign::new::<Sha256>();
                let signature = private_key.sign(padding, hashed.as_ref())?;
                Ok(signature)
            }
            None => Err(anyhow!("No private key; cannot sign data")),
        }
    }

    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()> {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        let hashed = hasher.finalize();
        let padding = Pkcs1v15Sign::new::<Sha256>();

        self.0
            .verify(padding, hashed.as_ref(), signature)
            .map_err(|error| anyhow!(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn an_ed25519_jwk_round_trips_through_key_material() {
        let key = Ed25519KeyMaterial::generate();
        let signature = key.sign(b"payload").await.unwrap();

        let verifier = key
            .public_jwk()
            .to_key_material(JwtSignatureAlgorithm::EdDSA)
            .unwrap();
        verifier.verify(b"payload", &signature).await.unwrap();
        assert!(verifier.verify(b"other", &signature).await.is_err());
    }

    #[tokio::test]
    async fn a_p256_jwk_round_trips_through_key_material() {
        let key = P256KeyMaterial::generate();
        let signature = key.sign(b"payload").await.unwrap();

        let verifier = key
            .public_jwk()
            .to_key_material(JwtSignatureAlgorithm::ES256)
            .unwrap();
        verifier.verify(b"payload", &signature).await.unwrap();
    }

    #[tokio::test]
    async fn mismatched_key_types_are_rejected() {
        let key = Ed25519KeyMaterial::generate();
        let error = key
            .public_jwk()
            .to_key_material(JwtSignatureAlgorithm::RS256)
            .err()
            .unwrap();
        assert!(matches!(error, CredentialError::BadKey(_)));
    }
}
