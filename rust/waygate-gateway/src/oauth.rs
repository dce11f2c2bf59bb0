//! OAuth plumbing on the gateway side: dynamic client registration, the
//! authorize URL, and the code exchange.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use tokio::sync::RwLock;
use url::Url;

use waygate_core::api::{RegistrationRequest, RegistrationResponse, TokenResponse};
use waygate_core::metadata::AuthorizationServerMetadata;

/// Register this gateway as a public client at the session's authorization
/// server, caching the `client_id` per issuer so repeated session starts
/// against the same AS reuse one registration.
pub async fn ensure_client_registration(
    http: &reqwest::Client,
    as_metadata: &AuthorizationServerMetadata,
    callback_url: &Url,
    cache: &RwLock<HashMap<String, String>>,
) -> Result<String> {
    if let Some(client_id) = cache.read().await.get(&as_metadata.issuer) {
        return Ok(client_id.clone());
    }

    let registration_endpoint = as_metadata
        .registration_endpoint
        .as_deref()
        .ok_or_else(|| anyhow!("authorization server offers no registration endpoint"))?;

    let response: RegistrationResponse = http
        .post(registration_endpoint)
        .json(&RegistrationRequest {
            redirect_uris: vec![callback_url.to_string()],
            client_name: Some("waygate-gateway".into()),
        })
        .send()
        .await
        .context("client registration is unreachable")?
        .error_for_status()
        .context("client registration was refused")?
        .json()
        .await
        .context("unreadable registration response")?;

    info!(
        "Registered as {} at {}",
        response.client_id, as_metadata.issuer
    );

    cache
        .write()
        .await
        .insert(as_metadata.issuer.clone(), response.client_id.clone());

    Ok(response.client_id)
}

/// Parameters bound into every authorize URL.
pub struct AuthorizeUrlParams<'a> {
    pub client_id: &'a str,
    pub redirect_uri: &'a Url,
    pub scope: &'a str,
    pub state: &'a str,
    pub code_challenge: &'a str,
    pub resource: &'a str,
}

/// Build the authorization-endpoint URL with the full OAuth 2.1 parameter
/// set: code response type, PKCE S256 and the RFC 8707 resource indicator.
pub fn build_authorize_url(
    authorization_endpoint: &str,
    params: &AuthorizeUrlParams<'_>,
) -> Result<Url> {
    let mut url =
        Url::parse(authorization_endpoint).context("authorization_endpoint is not a URL")?;

    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", params.client_id)
        .append_pair("redirect_uri", params.redirect_uri.as_str())
        .append_pair("scope", params.scope)
        .append_pair("state", params.state)
        .append_pair("code_challenge", params.code_challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("resource", params.resource);

    Ok(url)
}

/// How a code exchange failed.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The token endpoint answered with a non-2xx status
    #[error("token endpoint answered {status}")]
    Refused {
        status: reqwest::StatusCode,
        body: String,
    },
    /// The token endpoint could not be reached or spoke garbage
    #[error("token exchange failed: {0}")]
    Transport(String),
}

/// Exchange an authorization code at the token endpoint, presenting the
/// PKCE verifier and re-asserting the resource indicator.
pub async fn exchange_code(
    http: &reqwest::Client,
    token_endpoint: &str,
    code: &str,
    redirect_uri: &Url,
    client_id: &str,
    code_verifier: &str,
    resource: &str,
) -> Result<TokenResponse, ExchangeError> {
    let response = http
        .post(token_endpoint)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", client_id),
            ("code_verifier", code_verifier),
            ("resource", resource),
        ])
        .send()
        .await
        .map_err(|error| ExchangeError::Transport(error.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ExchangeError::Refused { status, body });
    }

    response
        .json()
        .await
        .map_err(|error| ExchangeError::Transport(error.to_string()))
}
