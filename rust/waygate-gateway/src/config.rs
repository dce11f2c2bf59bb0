use anyhow::{Context, Result};
use url::Url;

use waygate_core::api::GatewayRoute;

/// Runtime configuration for the gateway, read once from the environment.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Public base URL; redirect URIs and consent links are built from it
    pub base: Url,
    /// Base URL of the resource server tool calls are forwarded to
    pub upstream: Url,
    /// Fallback protected-resource metadata URL, consulted when the probe
    /// yields no usable `WWW-Authenticate` pointer
    pub rs_metadata_fallback: Option<Url>,
    /// When set, AS metadata is fetched from here instead of the PRM's
    /// first `authorization_servers` entry
    pub as_metadata_url: Option<Url>,
    /// Base URL of the authorizer
    pub authorizer_base: Url,
    /// HMAC key for the signed state envelope
    pub state_secret: String,
    /// Wallet payment-method token injected into payment forwards; held
    /// only by the gateway
    pub wallet_pm_token: Option<String>,
    /// The end user this gateway terminates sessions for
    pub subject: String,
    /// The agent identity presented to the authorizer
    pub agent_id: String,
    /// Path probed (unauthenticated) on the upstream to trigger discovery
    pub probe_path: String,
    /// Include upstream error bodies as `detail` in responses
    pub debug_detail: bool,
    /// Origin allowed to call the gateway from a browser, if any
    pub cors_origin: Option<Url>,
}

impl GatewayConfig {
    /// Read configuration from `GW_BASE`, `UPSTREAM_RS`, `RS_META`,
    /// `AS_METADATA_URL`, `ADP_BASE`, `GW_STATE_SECRET`, `WALLET_PM_TOKEN`,
    /// `GW_SUBJECT`, `GW_AGENT_ID`, `GW_PROBE_PATH`, `GW_DEBUG` and
    /// `GW_CORS_ORIGIN`.
    pub fn from_env() -> Result<Self> {
        let base = std::env::var("GW_BASE").context("GW_BASE is required")?;
        let upstream = std::env::var("UPSTREAM_RS").context("UPSTREAM_RS is required")?;
        let authorizer_base = std::env::var("ADP_BASE").context("ADP_BASE is required")?;
        let state_secret =
            std::env::var("GW_STATE_SECRET").context("GW_STATE_SECRET is required")?;

        let rs_metadata_fallback = match std::env::var("RS_META") {
            Ok(value) => Some(Url::parse(&value).context("RS_META must be a URL")?),
            Err(_) => None,
        };

        let as_metadata_url = match std::env::var("AS_METADATA_URL") {
            Ok(value) => Some(Url::parse(&value).context("AS_METADATA_URL must be a URL")?),
            Err(_) => None,
        };

        Ok(GatewayConfig {
            base: Url::parse(&base).context("GW_BASE must be an absolute URL")?,
            upstream: Url::parse(&upstream).context("UPSTREAM_RS must be an absolute URL")?,
            rs_metadata_fallback,
            as_metadata_url,
            authorizer_base: Url::parse(&authorizer_base)
                .context("ADP_BASE must be an absolute URL")?,
            state_secret,
            wallet_pm_token: std::env::var("WALLET_PM_TOKEN").ok(),
            subject: std::env::var("GW_SUBJECT").unwrap_or_else(|_| "user-123".into()),
            agent_id: std::env::var("GW_AGENT_ID").unwrap_or_else(|_| "agent-demo".into()),
            probe_path: std::env::var("GW_PROBE_PATH").unwrap_or_else(|_| "/mcp/echo".into()),
            debug_detail: std::env::var("GW_DEBUG").is_ok(),
            cors_origin: match std::env::var("GW_CORS_ORIGIN") {
                Ok(value) => Some(Url::parse(&value).context("GW_CORS_ORIGIN must be a URL")?),
                Err(_) => None,
            },
        })
    }

    /// The OAuth redirect URI registered with every authorization server.
    pub fn callback_url(&self) -> Url {
        GatewayRoute::OauthCallback.to_url(&self.base)
    }

    /// The explicit-consent page for a session.
    pub fn consent_url(&self, sid: &str) -> Url {
        let mut url = GatewayRoute::Consent.to_url(&self.base);
        url.query_pairs_mut().append_pair("sid", sid);
        url
    }
}
