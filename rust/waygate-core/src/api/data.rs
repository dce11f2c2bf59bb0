use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The obligations a policy decision attaches to a session. The gateway
/// enforces these before every upstream forward; they are immutable for the
/// life of the session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Obligations {
    /// Requests must reference exactly this order identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_order: Option<String>,
    /// `amount_cents` on a request may not exceed this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount_cents: Option<u64>,
    /// `merchant_id` on a request must be one of these
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_allowlist: Option<Vec<String>>,
    /// Obligations expire this many seconds after they were issued; after
    /// that the session must re-authenticate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl Obligations {
    /// True when no obligation is set at all.
    pub fn is_empty(&self) -> bool {
        self.bind_order.is_none()
            && self.max_amount_cents.is_none()
            && self.merchant_allowlist.is_none()
            && self.ttl.is_none()
    }
}

/// `POST /session/start` request body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionStartRequest {
    /// Stable tool identifier, e.g. `mcp.echo`
    pub tool_id: String,
    /// The single scope the agent wants for this session
    pub scope: String,
    /// Free-form context forwarded to policy evaluation (order IDs, amounts,
    /// merchants, ...)
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// `POST /session/start` response body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionStartResponse {
    /// Opaque session identifier
    pub sid: String,
    /// Where the user agent must go to authorize the session
    pub authorize_url: String,
}

/// `GET /session/status` query parameters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionStatusParams {
    /// Ask about one specific session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Ask whether any ready session covers this scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// `GET /session/status` response body. Never carries the token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    #[allow(missing_docs)]
    pub ready: bool,
}

/// `GET /oauth/callback` query parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct CallbackParams {
    #[allow(missing_docs)]
    pub code: Option<String>,
    #[allow(missing_docs)]
    pub state: Option<String>,
    /// Present when the authorization server reports a failure
    pub error: Option<String>,
    #[allow(missing_docs)]
    pub error_description: Option<String>,
}

/// Query/body shape shared by `GET /consent` and `POST /consent/approve`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsentParams {
    #[allow(missing_docs)]
    pub sid: String,
}

/// `POST /evaluate` request to the authorizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluateRequest {
    /// The end user on whose behalf the agent acts
    pub subject: String,
    /// The agent exercising the delegation
    pub agent_id: String,
    #[allow(missing_docs)]
    pub tool_id: String,
    /// Resource identifier of the RS the session targets
    pub audience: String,
    #[allow(missing_docs)]
    pub requested_scopes: Vec<String>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// `POST /evaluate` response from the authorizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluateResponse {
    #[allow(missing_docs)]
    pub allow: bool,
    /// The scopes the gateway should actually request; empty means "use the
    /// requested scopes"
    #[serde(default)]
    pub scopes: Vec<String>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub obligations: Obligations,
    /// Populated on deny with a stable reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `POST /consent` request to the authorizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsentRequest {
    #[allow(missing_docs)]
    pub subject: String,
    #[allow(missing_docs)]
    pub agent_id: String,
    #[allow(missing_docs)]
    pub tool_id: String,
    #[allow(missing_docs)]
    pub audience: String,
    #[allow(missing_docs)]
    pub scopes: Vec<String>,
    /// True when a human has just clicked through the gateway consent page
    pub explicit: bool,
}

/// `POST /consent` response from the authorizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsentResponse {
    #[allow(missing_docs)]
    pub allow: bool,
    /// `auto-<ts>` for delegation-covered consent, `exp-<ts>` for explicit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `POST /delegations` request to the authorizer: a compact signed
/// credential plus the key to verify it with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelegationSubmission {
    /// Compact JWS authored by the user
    pub jws: String,
    /// The verification key, as a public JWK
    pub public_jwk: crate::authority::PublicJwk,
}

/// `POST /delegations` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DelegationStored {
    #[allow(missing_docs)]
    pub stored: bool,
    /// The `(subject, agent_id, tool_id)` key the record was stored under
    pub key: String,
}

/// RFC 7591 dynamic client registration request (public-client profile).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationRequest {
    #[allow(missing_docs)]
    pub redirect_uris: Vec<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

/// RFC 7591 dynamic client registration response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    /// Generated public client identifier; no secret is ever issued
    pub client_id: String,
    #[allow(missing_docs)]
    pub redirect_uris: Vec<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Always `none`
    pub token_endpoint_auth_method: String,
}

/// `POST /token` form body at the authorization server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenRequestForm {
    #[allow(missing_docs)]
    pub grant_type: String,
    #[allow(missing_docs)]
    pub code: String,
    #[allow(missing_docs)]
    pub redirect_uri: String,
    #[allow(missing_docs)]
    pub client_id: String,
    #[allow(missing_docs)]
    pub code_verifier: String,
    /// RFC 8707 resource indicator; takes precedence over the one presented
    /// at the authorization endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// Successful `POST /token` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    #[allow(missing_docs)]
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Seconds until expiry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// RFC 7662 introspection response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    #[allow(missing_docs)]
    pub active: bool,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Why the token is inactive, when the server cares to say
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
