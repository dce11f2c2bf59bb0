//! Random identifier generation for session IDs, nonces, PKCE verifiers,
//! authorization codes and client IDs.

use base64::Engine;
use rand::RngCore;

/// Produce `bytes` bytes of randomness, base64url-encoded without padding.
pub fn random_urlsafe(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buffer);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buffer)
}

/// Produce `bytes` bytes of randomness as a lower-case hex string.
pub fn random_hex(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buffer);
    buffer.iter().map(|byte| format!("{:02x}", byte)).collect()
}
