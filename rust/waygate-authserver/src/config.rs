use anyhow::{Context, Result};
use url::Url;

use waygate_core::tools::TOOL_ROUTES;

/// Runtime configuration for the authorization server, read once from the
/// environment at startup.
#[derive(Clone, Debug)]
pub struct AuthServerConfig {
    /// Public base URL; also the token issuer identity
    pub base: Url,
    /// HMAC key for HS256 access tokens
    pub signing_secret: String,
    /// Audience minted when neither token nor authorize request carried a
    /// resource indicator
    pub default_audience: Option<String>,
    /// The subject every demo authorization is issued for
    pub demo_subject: String,
    /// Advertised in metadata
    pub scopes_supported: Vec<String>,
}

impl AuthServerConfig {
    /// Read configuration from `AS_BASE`, `AS_SIGNING_SECRET`,
    /// `AS_DEFAULT_AUD` and `AS_DEMO_SUBJECT`.
    pub fn from_env() -> Result<Self> {
        let base = std::env::var("AS_BASE").context("AS_BASE is required")?;
        let base = Url::parse(&base).context("AS_BASE must be an absolute URL")?;

        Ok(AuthServerConfig {
            base,
            signing_secret: std::env::var("AS_SIGNING_SECRET")
                .unwrap_or_else(|_| "waygate-demo-signing-secret".into()),
            default_audience: std::env::var("AS_DEFAULT_AUD").ok(),
            demo_subject: std::env::var("AS_DEMO_SUBJECT").unwrap_or_else(|_| "user-123".into()),
            scopes_supported: TOOL_ROUTES
                .iter()
                .map(|route| route.required_scope.to_string())
                .collect(),
        })
    }

    /// The issuer identity minted into `iss` claims: the origin of the base
    /// URL, without a trailing slash.
    pub fn issuer_id(&self) -> String {
        self.base.origin().ascii_serialization()
    }

    /// Render an endpoint path against the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        let mut url = self.base.clone();
        url.set_path(path);
        url.to_string()
    }
}
