//! Cross-cutting invariants: audience binding, the credential firewall,
//! and the debug surface that lets us observe both.

mod common;

use serde_json::{json, Value};

use common::Cluster;

#[tokio::test]
async fn issued_tokens_carry_the_discovered_audience() {
    let cluster = Cluster::start(false).await;

    let sid = cluster
        .authorized_session("mcp.echo", "echo:read", json!({}))
        .await;

    let verdict: Value = cluster
        .http
        .get(cluster.gw_endpoint("/debug/introspect"))
        .query(&[("sid", sid.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(verdict["active"], true);
    assert_eq!(verdict["aud"], cluster.resource.as_str());
    assert_eq!(verdict["sub"], "user-123");
    assert_eq!(verdict["scope"], "echo:read");
}

#[tokio::test]
async fn the_access_token_never_reaches_the_agent() {
    let cluster = Cluster::start(false).await;

    let sid = cluster
        .authorized_session("mcp.echo", "echo:read", json!({}))
        .await;

    // The debug surface is the only sanctioned leak; use it to learn what
    // string must never appear elsewhere
    let debug: Value = cluster
        .http
        .get(cluster.gw_endpoint("/debug/token"))
        .query(&[("sid", sid.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = debug["access_token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    let status_body = cluster
        .http
        .get(cluster.gw_endpoint("/session/status"))
        .query(&[("sid", sid.as_str())])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!status_body.contains(&token));

    let echo_body = cluster
        .http
        .get(cluster.gw_endpoint("/mcp/echo"))
        .query(&[("msg", "leaky?")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!echo_body.contains(&token));
}

#[tokio::test]
async fn the_consent_page_names_the_agent_and_its_ask() {
    let cluster = Cluster::start(false).await;

    let session = cluster
        .client
        .start_session("mcp.tickets", "tickets:read", Default::default())
        .await
        .unwrap();

    // Demo mode without a delegation routes through the gateway consent page
    assert!(session.authorize_url.contains("/consent"));

    let page = cluster
        .http
        .get(&session.authorize_url)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(page.contains("agent-demo"));
    assert!(page.contains("mcp.tickets"));
    assert!(page.contains("tickets:read"));
    assert!(page.contains(&session.sid));
}

#[tokio::test]
async fn status_by_scope_tracks_session_lifecycle() {
    let cluster = Cluster::start(false).await;

    let by_scope = |scope: &str| {
        let url = cluster.gw_endpoint("/session/status");
        let scope = scope.to_string();
        let http = cluster.http.clone();
        async move {
            let body: Value = http
                .get(url)
                .query(&[("scope", scope.as_str())])
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            body["ready"] == true
        }
    };

    assert!(!by_scope("echo:read").await);

    cluster
        .authorized_session("mcp.echo", "echo:read", json!({}))
        .await;

    assert!(by_scope("echo:read").await);
    assert!(!by_scope("payments:charge").await);

    // A debug reset empties the table
    let reset: Value = cluster
        .http
        .post(cluster.gw_endpoint("/debug/session/reset"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset["cleared"], 1);
    assert!(!by_scope("echo:read").await);
}
