//! Resource and authorization server discovery.
//!
//! Session start begins with an unauthenticated probe of the upstream; a
//! conforming resource server answers 401 with a `WWW-Authenticate`
//! challenge whose `resource_metadata` parameter points at its RFC 9728
//! document. That document names the authorization servers, whose RFC 8414
//! metadata is fetched in turn. A configured fallback PRM URL covers
//! upstreams that cannot be probed; start fails only when both paths fail.

use anyhow::{anyhow, Context, Result};
use reqwest::header::WWW_AUTHENTICATE;
use url::Url;

use waygate_core::metadata::{
    normalize_as_metadata_url, AuthorizationServerMetadata, BearerChallenge,
    ProtectedResourceMetadata,
};

/// The pair of documents a session is anchored to.
#[derive(Clone, Debug)]
pub struct Discovered {
    pub rs_metadata: ProtectedResourceMetadata,
    pub as_metadata: AuthorizationServerMetadata,
}

async fn probe_for_prm_url(
    http: &reqwest::Client,
    upstream: &Url,
    probe_path: &str,
) -> Result<Url> {
    let mut probe_url = upstream.clone();
    probe_url.set_path(probe_path);

    debug!("Probing {} for a bearer challenge", probe_url);

    let response = http.get(probe_url).send().await?;
    let challenge = response
        .headers()
        .get(WWW_AUTHENTICATE)
        .and_then(|value| value.to_str().ok())
        .and_then(BearerChallenge::parse)
        .ok_or_else(|| anyhow!("upstream probe returned no bearer challenge"))?;

    let prm_url = challenge
        .resource_metadata
        .ok_or_else(|| anyhow!("bearer challenge carries no resource_metadata"))?;

    Url::parse(&prm_url).context("resource_metadata is not a URL")
}

async fn fetch_prm(
    http: &reqwest::Client,
    prm_url: &Url,
) -> Result<ProtectedResourceMetadata> {
    Ok(http
        .get(prm_url.clone())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?)
}

/// Discover the upstream's protected-resource metadata and the metadata of
/// its first advertised authorization server. `as_metadata_override`
/// short-circuits AS resolution for deployments that pin their AS.
pub async fn discover(
    http: &reqwest::Client,
    upstream: &Url,
    probe_path: &str,
    fallback_prm: Option<&Url>,
    as_metadata_override: Option<&Url>,
) -> Result<Discovered> {
    let probed = match probe_for_prm_url(http, upstream, probe_path).await {
        Ok(prm_url) => fetch_prm(http, &prm_url).await,
        Err(error) => Err(error),
    };

    let rs_metadata = match probed {
        Ok(metadata) => metadata,
        Err(probe_error) => {
            let fallback = fallback_prm.ok_or_else(|| {
                anyhow!("discovery probe failed and no fallback is configured: {probe_error}")
            })?;
            warn!(
                "Discovery probe failed ({}); falling back to {}",
                probe_error, fallback
            );
            fetch_prm(http, fallback)
                .await
                .with_context(|| format!("fallback metadata fetch from {} failed", fallback))?
        }
    };

    let as_metadata_url = match as_metadata_override {
        Some(url) => url.clone(),
        None => {
            let as_entry = rs_metadata
                .authorization_servers
                .first()
                .ok_or_else(|| anyhow!("resource metadata names no authorization server"))?;
            normalize_as_metadata_url(as_entry)?
        }
    };

    debug!("Fetching AS metadata from {}", as_metadata_url);

    let as_metadata: AuthorizationServerMetadata = http
        .get(as_metadata_url.clone())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .with_context(|| format!("AS metadata fetch from {} failed", as_metadata_url))?;

    Ok(Discovered {
        rs_metadata,
        as_metadata,
    })
}
