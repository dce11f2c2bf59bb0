//! Test harness: the whole five-service constellation, in-process, on
//! ephemeral ports.

// Each test binary uses a different slice of the harness
#![allow(dead_code)]

use std::net::TcpListener;

use serde_json::{json, Value};
use url::Url;

use waygate_authorizer::{start_authorizer, DelegationStore};
use waygate_authserver::{start_authserver, AuthServerConfig};
use waygate_client::AgentClient;
use waygate_core::authority::{
    DelegationClaims, DelegationConstraints, DelegationCredential, Ed25519KeyMaterial,
};
use waygate_core::time::unix_now;
use waygate_core::tracing::initialize_tracing;
use waygate_gateway::{start_gateway, GatewayConfig};
use waygate_resource::{start_resource_server, ResourceConfig};

pub const SUBJECT: &str = "user-123";
pub const AGENT_ID: &str = "agent-demo";
pub const WALLET_TOKEN: &str = "pm-wallet-7788";

pub struct Cluster {
    pub gw_base: Url,
    pub adp_base: Url,
    pub resource: String,
    pub client: AgentClient,
    pub http: reqwest::Client,
}

fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
    (listener, base)
}

impl Cluster {
    /// Boot AS, RS, ADP and GW; `strict` selects the authorizer's
    /// no-delegation posture.
    pub async fn start(strict: bool) -> Self {
        initialize_tracing();

        let (as_listener, as_base) = bind();
        let (rs_listener, rs_base) = bind();
        let (adp_listener, adp_base) = bind();
        let (gw_listener, gw_base) = bind();

        let resource = format!("{}mcp", rs_base);

        let as_config = AuthServerConfig {
            base: as_base.clone(),
            signing_secret: "cluster-signing-secret".into(),
            default_audience: None,
            demo_subject: SUBJECT.into(),
            scopes_supported: vec![
                "echo:read".into(),
                "tickets:read".into(),
                "payments:charge".into(),
            ],
        };
        tokio::spawn(async move { start_authserver(as_listener, as_config).await.unwrap() });

        let mut introspection_url = as_base.clone();
        introspection_url.set_path("/introspect");

        let rs_config = ResourceConfig {
            base: rs_base.clone(),
            resource: resource.clone(),
            authorization_servers: vec![as_base.to_string()],
            introspection_url,
            scopes_supported: vec![
                "echo:read".into(),
                "tickets:read".into(),
                "payments:charge".into(),
            ],
        };
        tokio::spawn(async move { start_resource_server(rs_listener, rs_config).await.unwrap() });

        let store = DelegationStore::ephemeral().unwrap();
        tokio::spawn(async move { start_authorizer(adp_listener, store, strict).await.unwrap() });

        let gw_config = GatewayConfig {
            base: gw_base.clone(),
            upstream: rs_base.clone(),
            rs_metadata_fallback: None,
            as_metadata_url: None,
            authorizer_base: adp_base.clone(),
            state_secret: "cluster-state-secret".into(),
            wallet_pm_token: Some(WALLET_TOKEN.into()),
            subject: SUBJECT.into(),
            agent_id: AGENT_ID.into(),
            probe_path: "/mcp/echo".into(),
            debug_detail: true,
            cors_origin: None,
        };
        tokio::spawn(async move { start_gateway(gw_listener, gw_config).await.unwrap() });

        Cluster {
            client: AgentClient::new(gw_base.clone()),
            gw_base,
            adp_base,
            resource,
            http: reqwest::Client::new(),
        }
    }

    /// Sign and submit a delegation for `(SUBJECT, AGENT_ID, tool_id)`.
    pub async fn seed_delegation(
        &self,
        tool_id: &str,
        scopes: &[&str],
        constraints: Option<DelegationConstraints>,
    ) {
        let key = Ed25519KeyMaterial::generate();
        let claims = DelegationClaims {
            subject: SUBJECT.into(),
            agent_id: AGENT_ID.into(),
            tool_id: tool_id.into(),
            scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
            not_after: Some(unix_now() + 3600),
            exp: None,
            iss: SUBJECT.into(),
            constraints,
        };
        let jws = DelegationCredential::issue(&claims, &key).await.unwrap();

        let mut url = self.adp_base.clone();
        url.set_path("/delegations");

        let response = self
            .http
            .post(url)
            .json(&json!({ "jws": jws, "public_jwk": key.public_jwk() }))
            .send()
            .await
            .unwrap();
        assert!(
            response.status().is_success(),
            "delegation seeding failed: {:?}",
            response.text().await
        );
    }

    /// Run start → approve → await-ready and hand back the session ID.
    pub async fn authorized_session(
        &self,
        tool_id: &str,
        scope: &str,
        context: Value,
    ) -> String {
        let session = self
            .client
            .start_session(tool_id, scope, context.as_object().cloned().unwrap_or_default())
            .await
            .unwrap();

        self.client.approve(&session.authorize_url).await.unwrap();
        self.client.await_ready(&session.sid).await.unwrap();

        session.sid
    }

    pub fn gw_endpoint(&self, path: &str) -> Url {
        let mut url = self.gw_base.clone();
        url.set_path(path);
        url
    }
}
