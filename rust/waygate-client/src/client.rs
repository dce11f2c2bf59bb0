use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use waygate_core::api::{
    GatewayRoute, SessionStartRequest, SessionStartResponse, SessionStatusResponse,
};
use waygate_core::error::ErrorBody;

/// How long an agent will wait for a session to become ready before
/// abandoning it. The gateway keeps the session; the agent just stops
/// caring.
pub const READY_CEILING: Duration = Duration::from_secs(120);

/// Pause between readiness polls.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The ways a gateway interaction can fail for the agent.
#[derive(Debug, Error)]
pub enum ClientError {
    /// `/session/start` came back `403 denied_by_policy`
    #[error("denied by policy: {0:?}")]
    DeniedByPolicy(Option<String>),
    /// A tool call found no ready session for its scope
    #[error("login required")]
    LoginRequired,
    /// A tool call breached a session obligation
    #[error("obligation violation: {0:?}")]
    ObligationViolation(Option<String>),
    /// The session's obligations aged out; re-authorization is needed
    #[error("session obligation ttl expired")]
    TtlExpired,
    /// The session never became ready inside [READY_CEILING]
    #[error("timed out waiting for session readiness")]
    Timeout,
    /// Any other non-2xx from the gateway
    #[error("gateway answered {status}: {error}")]
    Gateway {
        status: StatusCode,
        error: String,
        detail: Option<String>,
    },
    /// Transport-level failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// A simple, portable HTTP client for the Waygate gateway REST API. It
/// embodies the intended agent lifecycle: start a session, hand the
/// authorize URL to a user agent, poll readiness, call tools.
pub struct AgentClient {
    /// The gateway this client talks to
    pub api_base: Url,
    http: reqwest::Client,
}

impl AgentClient {
    pub fn new(api_base: Url) -> Self {
        AgentClient {
            api_base,
            http: reqwest::Client::new(),
        }
    }

    fn route(&self, route: GatewayRoute) -> Url {
        route.to_url(&self.api_base)
    }

    async fn classify(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body: ErrorBody = match response.json().await {
            Ok(body) => body,
            Err(_) => {
                return ClientError::Gateway {
                    status,
                    error: "unreadable error body".into(),
                    detail: None,
                }
            }
        };

        match body.error.as_str() {
            "denied_by_policy" => ClientError::DeniedByPolicy(body.detail),
            "login_required" => ClientError::LoginRequired,
            "obligation_violation" => ClientError::ObligationViolation(body.detail),
            "session_obligation_ttl_expired" => ClientError::TtlExpired,
            _ => ClientError::Gateway {
                status,
                error: body.error,
                detail: body.detail,
            },
        }
    }

    /// Open a session for one tool and scope.
    pub async fn start_session(
        &self,
        tool_id: &str,
        scope: &str,
        context: Map<String, Value>,
    ) -> Result<SessionStartResponse, ClientError> {
        debug!("Starting a session for {} ({})", tool_id, scope);

        let response = self
            .http
            .post(self.route(GatewayRoute::SessionStart))
            .json(&SessionStartRequest {
                tool_id: tool_id.into(),
                scope: scope.into(),
                context,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }

        Ok(response.json().await?)
    }

    /// Play the user agent: walk the authorize URL's redirect chain until
    /// the gateway callback page renders. When the URL points at the
    /// gateway's own consent page, approve it first; the approval response
    /// redirects onward to the real authorization endpoint.
    pub async fn approve(&self, authorize_url: &str) -> Result<(), ClientError> {
        let url = Url::parse(authorize_url).map_err(|_| ClientError::Gateway {
            status: StatusCode::BAD_REQUEST,
            error: "unparseable authorize_url".into(),
            detail: Some(authorize_url.into()),
        })?;

        let response = if url.path() == GatewayRoute::Consent.to_string() {
            debug!("Authorize URL is a consent page; approving");
            let sid = url
                .query_pairs()
                .find(|(key, _)| key == "sid")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();

            self.http
                .post(self.route(GatewayRoute::ConsentApprove))
                .form(&[("sid", sid.as_str())])
                .send()
                .await?
        } else {
            self.http.get(url).send().await?
        };

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }

        Ok(())
    }

    async fn status(&self, sid: &str) -> Result<bool, ClientError> {
        let mut url = self.route(GatewayRoute::SessionStatus);
        url.query_pairs_mut().append_pair("sid", sid);

        let status: SessionStatusResponse = self.http.get(url).send().await?.json().await?;
        Ok(status.ready)
    }

    /// Poll until the session is ready, or give up at [READY_CEILING].
    pub async fn await_ready(&self, sid: &str) -> Result<(), ClientError> {
        let deadline = tokio::time::Instant::now() + READY_CEILING;

        loop {
            if self.status(sid).await? {
                debug!("Session {} is ready", sid);
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                warn!("Abandoning session {} after {:?}", sid, READY_CEILING);
                return Err(ClientError::Timeout);
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn expect_json(response: reqwest::Response) -> Result<Value, ClientError> {
        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }
        Ok(response.json().await?)
    }

    /// `GET /mcp/echo?msg=`.
    pub async fn echo(&self, msg: &str) -> Result<Value, ClientError> {
        let mut url = self.route(GatewayRoute::Tool("echo"));
        url.query_pairs_mut().append_pair("msg", msg);
        Self::expect_json(self.http.get(url).send().await?).await
    }

    /// `GET /mcp/tickets`.
    pub async fn tickets(&self) -> Result<Value, ClientError> {
        Self::expect_json(
            self.http
                .get(self.route(GatewayRoute::Tool("tickets")))
                .send()
                .await?,
        )
        .await
    }

    /// `POST /mcp/pay`. The body carries what the agent knows; the gateway
    /// adds the payment credential on the far side.
    pub async fn pay(
        &self,
        order_id: &str,
        amount_cents: u64,
        merchant_id: &str,
    ) -> Result<Value, ClientError> {
        Self::expect_json(
            self.http
                .post(self.route(GatewayRoute::Tool("pay")))
                .json(&serde_json::json!({
                    "orderId": order_id,
                    "amount_cents": amount_cents,
                    "merchant_id": merchant_id,
                }))
                .send()
                .await?,
        )
        .await
    }
}
