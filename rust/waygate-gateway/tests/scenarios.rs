//! The literal end-to-end scenarios: happy echo, scope segregation, amount
//! caps, merchant allowlists, obligation ttl and replay defense — driven
//! through a live gateway against live AS/RS/ADP counterparts.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Value};
use url::Url;

use common::Cluster;
use waygate_client::ClientError;
use waygate_core::authority::DelegationConstraints;

#[tokio::test]
async fn happy_echo_round_trip() {
    let cluster = Cluster::start(false).await;

    let sid = cluster
        .authorized_session("mcp.echo", "echo:read", json!({}))
        .await;

    let reply = cluster.client.echo("hi").await.unwrap();
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["echo"], "hi");
    assert_eq!(reply["user"], "user-123");
    assert_eq!(reply["scope"], "echo:read");

    // The readiness bit survives repeated polling
    let status: Value = cluster
        .http
        .get(cluster.gw_endpoint("/session/status"))
        .query(&[("sid", sid.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["ready"], true);
}

#[tokio::test]
async fn happy_echo_with_a_real_delegation() {
    let cluster = Cluster::start(true).await;
    cluster.seed_delegation("mcp.echo", &["echo:read"], None).await;

    cluster
        .authorized_session("mcp.echo", "echo:read", json!({}))
        .await;

    let reply = cluster.client.echo("delegated").await.unwrap();
    assert_eq!(reply["echo"], "delegated");
}

#[tokio::test]
async fn a_tickets_session_never_pays() {
    let cluster = Cluster::start(false).await;

    cluster
        .authorized_session("mcp.tickets", "tickets:read", json!({}))
        .await;

    // The tickets session works for tickets...
    let tickets = cluster.client.tickets().await.unwrap();
    assert_eq!(tickets["ok"], true);

    // ...but buys nothing on the payment path
    let error = cluster
        .client
        .pay("order-1001", 1200, "mcp-tix")
        .await
        .err()
        .unwrap();
    assert!(matches!(error, ClientError::LoginRequired));

    // A payment session fixes it
    cluster
        .authorized_session(
            "mcp.pay",
            "payments:charge",
            json!({ "orderId": "order-1001", "amount_cents": 1200, "merchant_id": "mcp-tix" }),
        )
        .await;

    let charged = cluster.client.pay("order-1001", 1200, "mcp-tix").await.unwrap();
    assert_eq!(charged["status"], "succeeded");
    assert_eq!(charged["order_id"], "order-1001");
}

#[tokio::test]
async fn the_amount_cap_is_enforced_per_request() {
    let cluster = Cluster::start(true).await;
    cluster
        .seed_delegation(
            "mcp.pay",
            &["payments:charge"],
            Some(DelegationConstraints {
                max_amount_cents: Some(2000),
                merchants: Some(vec!["mcp-tix".into()]),
                ttl: None,
            }),
        )
        .await;

    cluster
        .authorized_session(
            "mcp.pay",
            "payments:charge",
            json!({ "orderId": "order-1001" }),
        )
        .await;

    let error = cluster
        .client
        .pay("order-1001", 3000, "mcp-tix")
        .await
        .err()
        .unwrap();
    match error {
        ClientError::ObligationViolation(detail) => {
            assert_eq!(detail.as_deref(), Some("amount exceeds max"))
        }
        other => panic!("expected an obligation violation, got {:?}", other),
    }

    // Under the cap the same session pays fine
    let charged = cluster.client.pay("order-1001", 1200, "mcp-tix").await.unwrap();
    assert_eq!(charged["status"], "succeeded");
}

#[tokio::test]
async fn the_merchant_allowlist_is_enforced_per_request() {
    let cluster = Cluster::start(true).await;
    cluster
        .seed_delegation(
            "mcp.pay",
            &["payments:charge"],
            Some(DelegationConstraints {
                max_amount_cents: Some(2000),
                merchants: Some(vec!["mcp-tix".into()]),
                ttl: None,
            }),
        )
        .await;

    cluster
        .authorized_session(
            "mcp.pay",
            "payments:charge",
            json!({ "orderId": "order-1001" }),
        )
        .await;

    let error = cluster
        .client
        .pay("order-1001", 1200, "evil-shop")
        .await
        .err()
        .unwrap();
    match error {
        ClientError::ObligationViolation(detail) => {
            assert_eq!(detail.as_deref(), Some("merchant not allowed"))
        }
        other => panic!("expected an obligation violation, got {:?}", other),
    }
}

#[tokio::test]
async fn the_order_binding_is_enforced_per_request() {
    let cluster = Cluster::start(false).await;

    cluster
        .authorized_session(
            "mcp.pay",
            "payments:charge",
            json!({ "orderId": "order-1001" }),
        )
        .await;

    let error = cluster
        .client
        .pay("order-9999", 1200, "mcp-tix")
        .await
        .err()
        .unwrap();
    match error {
        ClientError::ObligationViolation(detail) => {
            assert_eq!(detail.as_deref(), Some("orderId mismatch"))
        }
        other => panic!("expected an obligation violation, got {:?}", other),
    }
}

#[tokio::test]
async fn an_aged_out_ttl_forces_reauthorization() {
    let cluster = Cluster::start(true).await;
    cluster
        .seed_delegation(
            "mcp.pay",
            &["payments:charge"],
            Some(DelegationConstraints {
                max_amount_cents: None,
                merchants: None,
                ttl: Some(1),
            }),
        )
        .await;

    cluster
        .authorized_session(
            "mcp.pay",
            "payments:charge",
            json!({ "orderId": "order-1001" }),
        )
        .await;

    tokio::time::sleep(Duration::from_secs(2)).await;

    let error = cluster
        .client
        .pay("order-1001", 1200, "mcp-tix")
        .await
        .err()
        .unwrap();
    assert!(matches!(error, ClientError::TtlExpired));

    // The token was cleared with the ttl; the session no longer serves
    let error = cluster
        .client
        .pay("order-1001", 1200, "mcp-tix")
        .await
        .err()
        .unwrap();
    assert!(matches!(error, ClientError::LoginRequired));
}

#[tokio::test]
async fn codes_and_states_do_not_replay() {
    let cluster = Cluster::start(false).await;

    let session = cluster
        .client
        .start_session("mcp.echo", "echo:read", Default::default())
        .await
        .unwrap();

    // Walk the redirect chain by hand to capture (code, state)
    let no_redirect = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    // In demo mode consent is explicit, so approval starts at the gateway's
    // consent page and redirects on to the AS
    let approve = no_redirect
        .post(cluster.gw_endpoint("/consent/approve"))
        .form(&[("sid", session.sid.as_str())])
        .send()
        .await
        .unwrap();
    assert!(approve.status().is_redirection());
    let authorize_url = approve.headers()["location"].to_str().unwrap().to_string();

    let authorize = no_redirect.get(&authorize_url).send().await.unwrap();
    assert!(authorize.status().is_redirection());
    let callback_url =
        Url::parse(authorize.headers()["location"].to_str().unwrap()).unwrap();
    let query: HashMap<String, String> = callback_url.query_pairs().into_owned().collect();
    let code = query["code"].clone();
    let state = query["state"].clone();

    // First callback finalizes the session
    let first = cluster.http.get(callback_url.clone()).send().await.unwrap();
    assert!(first.status().is_success());
    cluster.client.await_ready(&session.sid).await.unwrap();

    // Replaying the code straight at the AS: invalid_grant
    let as_authorize = Url::parse(&authorize_url).unwrap();
    let mut token_endpoint = as_authorize.clone();
    token_endpoint.set_path("/token");
    token_endpoint.set_query(None);

    let replayed = cluster
        .http
        .post(token_endpoint)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", cluster.gw_endpoint("/oauth/callback").as_str()),
            ("client_id", "client-impostor"),
            ("code_verifier", "whatever-verifier-this-is-long-enough"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(replayed.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = replayed.json().await.unwrap();
    assert_eq!(body["error"], "invalid_grant");

    // Replaying the state at a fresh callback: the session is spent
    let mut replay_callback = cluster.gw_endpoint("/oauth/callback");
    replay_callback
        .query_pairs_mut()
        .append_pair("code", &code)
        .append_pair("state", &state);
    let second = cluster.http.get(replay_callback).send().await.unwrap();
    assert_eq!(second.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn policy_denial_surfaces_at_start() {
    let cluster = Cluster::start(true).await;

    let error = cluster
        .client
        .start_session("mcp.echo", "echo:read", Default::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(error, ClientError::DeniedByPolicy(_)));
}

#[tokio::test]
async fn a_forged_state_is_rejected_at_the_callback() {
    let cluster = Cluster::start(false).await;

    let mut callback = cluster.gw_endpoint("/oauth/callback");
    callback
        .query_pairs_mut()
        .append_pair("code", "some-code")
        .append_pair("state", "eyJmb3JnZWQiOnRydWV9.Zm9yZ2VkdGFn");

    let response = cluster.http.get(callback).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bad_signature");
}
