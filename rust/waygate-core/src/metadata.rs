//! OAuth discovery documents and the bearer challenge header.
//!
//! The resource server publishes protected-resource metadata (RFC 9728) and
//! points unauthenticated callers at it through the `WWW-Authenticate`
//! header; the authorization server publishes its own metadata document
//! (RFC 8414). The gateway consumes both during session start.

use serde::{Deserialize, Serialize};
use url::Url;

/// Well-known path for authorization server metadata (RFC 8414).
pub const AS_WELL_KNOWN_PATH: &str = "/.well-known/oauth-authorization-server";

/// Well-known path for protected resource metadata (RFC 9728).
pub const PRM_WELL_KNOWN_PATH: &str = "/.well-known/oauth-protected-resource";

/// Authorization server metadata, RFC 8414 profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Issuer identifier; also the value minted into token `iss` claims
    pub issuer: String,
    /// Where authorization requests go
    pub authorization_endpoint: String,
    /// Where codes are exchanged
    pub token_endpoint: String,
    /// RFC 7662 introspection endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,
    /// RFC 7591 dynamic client registration endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    /// Always `["S256"]` in this profile
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    /// Always `["none"]`: every client is public
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub grant_types_supported: Vec<String>,
}

/// Protected resource metadata, RFC 9728 profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The resource identifier; tokens for this resource carry it as `aud`
    pub resource: String,
    /// Authorization servers that can issue tokens for this resource
    pub authorization_servers: Vec<String>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    /// Where tokens for this resource can be introspected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,
}

/// The parameters of a `WWW-Authenticate: Bearer ...` challenge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BearerChallenge {
    #[allow(missing_docs)]
    pub realm: Option<String>,
    #[allow(missing_docs)]
    pub error: Option<String>,
    #[allow(missing_docs)]
    pub error_description: Option<String>,
    /// URL of the protected resource metadata document (RFC 9728 §5.1)
    pub resource_metadata: Option<String>,
}

impl BearerChallenge {
    /// Parse the parameter list of a `Bearer` challenge header value.
    ///
    /// Returns [None] when the value does not open with the `Bearer` scheme.
    pub fn parse(header_value: &str) -> Option<Self> {
        let params = header_value.strip_prefix("Bearer")?;
        let mut challenge = BearerChallenge::default();

        for (key, value) in parse_auth_params(params) {
            match key.as_str() {
                "realm" => challenge.realm = Some(value),
                "error" => challenge.error = Some(value),
                "error_description" => challenge.error_description = Some(value),
                "resource_metadata" => challenge.resource_metadata = Some(value),
                _ => (),
            }
        }

        Some(challenge)
    }

    /// Render this challenge as a `WWW-Authenticate` header value.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        for (key, value) in [
            ("realm", &self.realm),
            ("error", &self.error),
            ("error_description", &self.error_description),
            ("resource_metadata", &self.resource_metadata),
        ] {
            if let Some(value) = value {
                parts.push(format!(r#"{}="{}""#, key, value.replace('"', "'")));
            }
        }
        format!("Bearer {}", parts.join(", "))
    }
}

/// Split `key="value", key2="value2"` auth-param lists, tolerating unquoted
/// values and stray whitespace.
fn parse_auth_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut rest = input.trim_start();

    while let Some(equals) = rest.find('=') {
        let key = rest[..equals].trim().to_string();
        rest = &rest[equals + 1..];

        let value = if let Some(stripped) = rest.strip_prefix('"') {
            match stripped.find('"') {
                Some(end) => {
                    let value = stripped[..end].to_string();
                    rest = &stripped[end + 1..];
                    value
                }
                None => {
                    let value = stripped.to_string();
                    rest = "";
                    value
                }
            }
        } else {
            match rest.find(',') {
                Some(end) => {
                    let value = rest[..end].trim().to_string();
                    rest = &rest[end..];
                    value
                }
                None => {
                    let value = rest.trim().to_string();
                    rest = "";
                    value
                }
            }
        };

        if !key.is_empty() {
            params.push((key, value));
        }

        rest = rest.trim_start_matches([',', ' ', '\t']);
    }

    params
}

/// Normalize an `authorization_servers` entry into the URL of its RFC 8414
/// metadata document.
///
/// Entries that already end in the well-known path pass through; bare
/// issuer URLs are rewritten to `<origin>/.well-known/oauth-authorization-server`.
pub fn normalize_as_metadata_url(entry: &str) -> anyhow::Result<Url> {
    let url = Url::parse(entry)?;

    if url.path().ends_with(AS_WELL_KNOWN_PATH) {
        return Ok(url);
    }

    let mut normalized = url.clone();
    normalized.set_path(AS_WELL_KNOWN_PATH);
    normalized.set_query(None);
    normalized.set_fragment(None);
    Ok(normalized)
}
