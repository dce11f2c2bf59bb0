//! The obligation-gated reverse proxy.
//!
//! Upstream URLs come from the static tool registry; the bearer token and,
//! for payments, the gateway-held wallet token are injected here — after
//! the agent's request has been validated, never before. JSON responses
//! are parsed and re-serialized so upstream bytes cannot smuggle headers
//! or trailing garbage through the gateway.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use waygate_core::tools::ToolRoute;

use crate::session::Session;

/// Why a forward did not produce a proxied response.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Upstream said 401 or 403: the session's token is no longer good
    #[error("upstream rejected the bearer token")]
    TokenRejected,
    /// TCP/HTTP-level failure
    #[error("upstream unreachable: {0}")]
    Transport(String),
}

/// A response ready to hand back to the agent: original status, preserved
/// content type, re-serialized body.
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl IntoResponse for ProxiedResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        if let Some(content_type) = self
            .content_type
            .as_deref()
            .and_then(|value| HeaderValue::from_str(value).ok())
        {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Build the upstream URL for a tool call, carrying the agent's query
/// parameters over.
pub fn upstream_url(
    session: &Session,
    tool: &ToolRoute,
    order_id: Option<&str>,
    query: &[(String, String)],
) -> Option<Url> {
    let path = tool.upstream_path_for(order_id)?;

    let mut url = session.upstream.clone();
    url.set_path(&path);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }

    Some(url)
}

/// Forward a tool call upstream with the session's bearer token.
pub async fn forward(
    http: &reqwest::Client,
    session: &Session,
    tool: &ToolRoute,
    url: Url,
    body: Option<Value>,
) -> Result<ProxiedResponse, ProxyError> {
    let access_token = session
        .access_token
        .as_deref()
        .ok_or(ProxyError::TokenRejected)?;

    let mut request = match tool.method {
        "POST" => http.post(url),
        _ => http.get(url),
    };
    request = request.bearer_auth(access_token);
    if let Some(body) = &body {
        request = request.json(body);
    }

    let response = request
        .send()
        .await
        .map_err(|error| ProxyError::Transport(error.to_string()))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ProxyError::TokenRejected);
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(String::from);

    let bytes = response
        .bytes()
        .await
        .map_err(|error| ProxyError::Transport(error.to_string()))?;

    // Re-serialize JSON bodies rather than passing raw upstream bytes along
    let body = match content_type.as_deref() {
        Some(content_type) if content_type.starts_with("application/json") => {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => serde_json::to_vec(&value)
                    .map_err(|error| ProxyError::Transport(error.to_string()))?,
                Err(_) => bytes.to_vec(),
            }
        }
        _ => bytes.to_vec(),
    };

    Ok(ProxiedResponse {
        status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
        content_type,
        body,
    })
}
