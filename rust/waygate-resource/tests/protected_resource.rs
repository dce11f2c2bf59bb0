//! Bearer, audience and scope enforcement at the resource server, validated
//! through a live introspection hop to an in-process authorization server.

use std::net::TcpListener;

use serde_json::{json, Value};
use url::Url;

use waygate_authserver::{
    mint_access_token, start_authserver, AccessClaims, AuthServerConfig,
    ACCESS_TOKEN_LIFETIME_SECONDS,
};
use waygate_core::time::unix_now;
use waygate_core::tracing::initialize_tracing;
use waygate_resource::{start_resource_server, ResourceConfig};

const SIGNING_SECRET: &str = "test-signing-secret";
const RESOURCE: &str = "http://rs.test/mcp";

struct TestResourceServer {
    rs_base: Url,
    issuer: String,
    http: reqwest::Client,
}

impl TestResourceServer {
    async fn start() -> Self {
        initialize_tracing();

        let as_listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let as_base =
            Url::parse(&format!("http://{}", as_listener.local_addr().unwrap())).unwrap();

        let as_config = AuthServerConfig {
            base: as_base.clone(),
            signing_secret: SIGNING_SECRET.into(),
            default_audience: None,
            demo_subject: "user-123".into(),
            scopes_supported: vec![],
        };
        let issuer = as_config.issuer_id();
        tokio::spawn(async move { start_authserver(as_listener, as_config).await.unwrap() });

        let rs_listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let rs_base =
            Url::parse(&format!("http://{}", rs_listener.local_addr().unwrap())).unwrap();

        let mut introspection_url = as_base.clone();
        introspection_url.set_path("/introspect");

        let rs_config = ResourceConfig {
            base: rs_base.clone(),
            resource: RESOURCE.into(),
            authorization_servers: vec![as_base.to_string()],
            introspection_url,
            scopes_supported: vec!["echo:read".into(), "tickets:read".into()],
        };
        tokio::spawn(async move { start_resource_server(rs_listener, rs_config).await.unwrap() });

        TestResourceServer {
            rs_base,
            issuer,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.rs_base.clone();
        url.set_path(path);
        url
    }

    fn token(&self, scope: &str, audience: Option<&str>) -> String {
        let now = unix_now();
        mint_access_token(
            &AccessClaims {
                iss: self.issuer.clone(),
                sub: "user-123".into(),
                scope: scope.into(),
                aud: audience.map(String::from),
                iat: now,
                exp: now + ACCESS_TOKEN_LIFETIME_SECONDS,
                jti: "test-token".into(),
            },
            SIGNING_SECRET.as_bytes(),
        )
        .unwrap()
    }
}

#[tokio::test]
async fn unauthenticated_access_gets_a_challenge_pointing_at_the_prm() {
    let server = TestResourceServer::start().await;

    let response = server
        .http
        .get(server.endpoint("/mcp/echo"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let challenge = response.headers()["www-authenticate"].to_str().unwrap();
    assert!(challenge.starts_with("Bearer "));
    assert!(challenge.contains("resource_metadata="));
    assert!(challenge.contains("/.well-known/oauth-protected-resource"));
}

#[tokio::test]
async fn the_prm_document_names_the_resource_and_its_issuers() {
    let server = TestResourceServer::start().await;

    let prm: Value = server
        .http
        .get(server.endpoint("/.well-known/oauth-protected-resource"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(prm["resource"], RESOURCE);
    assert!(prm["authorization_servers"].as_array().unwrap().len() == 1);
}

#[tokio::test]
async fn a_well_scoped_token_reaches_the_tool() {
    let server = TestResourceServer::start().await;
    let token = server.token("echo:read", Some(RESOURCE));

    let body: Value = server
        .http
        .get(server.endpoint("/mcp/echo"))
        .query(&[("msg", "hi")])
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["ok"], true);
    assert_eq!(body["echo"], "hi");
    assert_eq!(body["user"], "user-123");
    assert_eq!(body["scope"], "echo:read");
}

#[tokio::test]
async fn a_foreign_audience_is_refused() {
    let server = TestResourceServer::start().await;
    let token = server.token("echo:read", Some("http://other-rs.test"));

    let response = server
        .http
        .get(server.endpoint("/mcp/echo"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bad_audience");
}

#[tokio::test]
async fn a_missing_scope_is_a_403() {
    let server = TestResourceServer::start().await;
    let token = server.token("echo:read", Some(RESOURCE));

    let response = server
        .http
        .get(server.endpoint("/tickets"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_scope");
}

#[tokio::test]
async fn a_garbage_token_is_inactive() {
    let server = TestResourceServer::start().await;

    let response = server
        .http
        .get(server.endpoint("/mcp/echo"))
        .bearer_auth("three.random.segments")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn payment_requires_the_wallet_token() {
    let server = TestResourceServer::start().await;
    let token = server.token("payments:charge", Some(RESOURCE));

    let missing = server
        .http
        .post(server.endpoint("/orders/order-1001/pay"))
        .bearer_auth(&token)
        .json(&json!({ "amount_cents": 1200, "merchant_id": "mcp-tix" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    let charged: Value = server
        .http
        .post(server.endpoint("/orders/order-1001/pay"))
        .bearer_auth(&token)
        .json(&json!({
            "amount_cents": 1200,
            "merchant_id": "mcp-tix",
            "payment_method_token": "pm-wallet-7788",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(charged["status"], "succeeded");
    assert_eq!(charged["order_id"], "order-1001");
    assert_eq!(charged["amount_cents"], 1200);
    assert_eq!(charged["charged_with"], "...7788");
}
