//! Delegation credentials and the key material that verifies them.
//!
//! A delegation is a compact signed token (JWS) authored by a user,
//! authorizing an agent to exercise scopes on a tool within constraints.
//! The authorizer verifies submissions against a caller-supplied public
//! JWK; EdDSA, ES256 and RS256 keys are supported.

mod credential;
mod key_material;

pub use credential::*;
pub use key_material::*;
