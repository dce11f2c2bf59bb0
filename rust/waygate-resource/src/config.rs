use anyhow::{Context, Result};
use url::Url;

use waygate_core::metadata::PRM_WELL_KNOWN_PATH;
use waygate_core::tools::TOOL_ROUTES;

/// Runtime configuration for the resource server.
#[derive(Clone, Debug)]
pub struct ResourceConfig {
    /// Public base URL of this server
    pub base: Url,
    /// The resource identifier tokens must carry as `aud`
    pub resource: String,
    /// Authorization servers advertised in the PRM document
    pub authorization_servers: Vec<String>,
    /// Where bearer tokens are introspected
    pub introspection_url: Url,
    /// Advertised in the PRM document
    pub scopes_supported: Vec<String>,
}

impl ResourceConfig {
    /// Read configuration from `RS_BASE`, `EXPECTED_AUD`, `AS_BASE` and
    /// `AUTH_INTROSPECT_URL`.
    pub fn from_env() -> Result<Self> {
        let base = std::env::var("RS_BASE").context("RS_BASE is required")?;
        let base = Url::parse(&base).context("RS_BASE must be an absolute URL")?;

        let resource = std::env::var("EXPECTED_AUD").context("EXPECTED_AUD is required")?;

        let authorization_server =
            std::env::var("AS_BASE").context("AS_BASE is required")?;

        let introspection_url = std::env::var("AUTH_INTROSPECT_URL")
            .context("AUTH_INTROSPECT_URL is required")?;
        let introspection_url =
            Url::parse(&introspection_url).context("AUTH_INTROSPECT_URL must be a URL")?;

        Ok(ResourceConfig {
            base,
            resource,
            authorization_servers: vec![authorization_server],
            introspection_url,
            scopes_supported: TOOL_ROUTES
                .iter()
                .map(|route| route.required_scope.to_string())
                .collect(),
        })
    }

    /// The URL of this server's protected-resource metadata document.
    pub fn prm_url(&self) -> Url {
        let mut url = self.base.clone();
        url.set_path(PRM_WELL_KNOWN_PATH);
        url
    }
}
