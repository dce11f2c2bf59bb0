//! The gateway's client for the authorizer.

use anyhow::{Context, Result};
use url::Url;

use waygate_core::api::{ConsentRequest, ConsentResponse, EvaluateRequest, EvaluateResponse};

/// Thin HTTP client for the authorizer's `/evaluate` and `/consent`.
#[derive(Clone)]
pub struct AuthorizerClient {
    http: reqwest::Client,
    base: Url,
}

impl AuthorizerClient {
    pub fn new(http: reqwest::Client, base: Url) -> Self {
        AuthorizerClient { http, base }
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url
    }

    /// Ask which scopes and obligations apply.
    pub async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluateResponse> {
        self.http
            .post(self.endpoint("/evaluate"))
            .json(request)
            .send()
            .await
            .context("authorizer is unreachable")?
            .error_for_status()
            .context("authorizer refused the evaluate call")?
            .json()
            .await
            .context("unreadable evaluate response")
    }

    /// Ask whether consent can be granted without a human.
    pub async fn consent(&self, request: &ConsentRequest) -> Result<ConsentResponse> {
        self.http
            .post(self.endpoint("/consent"))
            .json(request)
            .send()
            .await
            .context("authorizer is unreachable")?
            .error_for_status()
            .context("authorizer refused the consent call")?
            .json()
            .await
            .context("unreadable consent response")
    }
}
