use std::fmt::Display;

use url::Url;

/// All of the routes on the gateway's public surface.
///
/// The agent client renders these into request URLs so the two sides cannot
/// drift apart on paths.
pub enum GatewayRoute {
    /// Open a session for a tool and scope
    SessionStart,
    /// Poll whether a session (or any session for a scope) is ready
    SessionStatus,
    /// OAuth redirect target; finalizes a session
    OauthCallback,
    /// The explicit-consent page
    Consent,
    /// Approve explicit consent for a session
    ConsentApprove,
    /// Invoke a tool by its short name
    Tool(&'static str),
    /// Liveness
    Healthz,
    /// Drop every session (dev only)
    DebugSessionReset,
    /// Reveal a session's raw token (dev only)
    DebugToken,
    /// Introspect a session's token at the AS (dev only)
    DebugIntrospect,
}

impl Display for GatewayRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = match self {
            GatewayRoute::SessionStart => "/session/start",
            GatewayRoute::SessionStatus => "/session/status",
            GatewayRoute::OauthCallback => "/oauth/callback",
            GatewayRoute::Consent => "/consent",
            GatewayRoute::ConsentApprove => "/consent/approve",
            GatewayRoute::Tool(name) => return write!(f, "/mcp/{}", name),
            GatewayRoute::Healthz => "/healthz",
            GatewayRoute::DebugSessionReset => "/debug/session/reset",
            GatewayRoute::DebugToken => "/debug/token",
            GatewayRoute::DebugIntrospect => "/debug/introspect",
        };
        write!(f, "{}", path)
    }
}

impl GatewayRoute {
    /// Render this route against a gateway base URL.
    pub fn to_url(&self, api_base: &Url) -> Url {
        let mut url = api_base.clone();
        url.set_path(&self.to_string());
        url.set_query(None);
        url
    }
}
