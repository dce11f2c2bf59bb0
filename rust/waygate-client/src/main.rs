#[macro_use]
extern crate tracing;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Map;
use url::Url;

use waygate_client::AgentClient;
use waygate_core::tracing::initialize_tracing;

/// Drive the happy echo flow end to end against a running gateway.
#[derive(Parser)]
#[command(name = "waygate-client", about = "Waygate demo agent")]
struct Cli {
    /// Gateway base URL
    #[arg(long, env = "GW_BASE", default_value = "http://127.0.0.1:9100")]
    gateway: String,

    /// Message to echo through the protected tool
    #[arg(long, default_value = "hi")]
    msg: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let args = Cli::parse();
    let gateway = Url::parse(&args.gateway).context("gateway must be a URL")?;
    let client = AgentClient::new(gateway);

    let session = client
        .start_session("mcp.echo", "echo:read", Map::new())
        .await?;
    info!("Session {} opened; authorizing", session.sid);

    client.approve(&session.authorize_url).await?;
    client.await_ready(&session.sid).await?;

    let reply = client.echo(&args.msg).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);

    Ok(())
}
