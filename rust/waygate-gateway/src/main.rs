#[macro_use]
extern crate tracing;

use std::net::TcpListener;

use anyhow::Result;
use clap::Parser;

use waygate_core::tracing::initialize_tracing;
use waygate_gateway::{start_gateway, GatewayConfig};

#[derive(Parser)]
#[command(name = "waygate-gateway", about = "The Waygate identity-aware gateway")]
struct Cli {
    /// Interface to listen on
    #[arg(long, default_value = "127.0.0.1")]
    interface: String,

    /// Port to listen on
    #[arg(long, env = "GW_PORT", default_value_t = 9100)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let args = Cli::parse();
    let config = GatewayConfig::from_env()?;

    let listener = TcpListener::bind((args.interface.as_str(), args.port))?;
    info!("Gateway listening on port {}", args.port);

    start_gateway(listener, config).await
}
