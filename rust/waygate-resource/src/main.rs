#[macro_use]
extern crate tracing;

use std::net::TcpListener;

use anyhow::Result;
use clap::Parser;

use waygate_core::tracing::initialize_tracing;
use waygate_resource::{start_resource_server, ResourceConfig};

#[derive(Parser)]
#[command(name = "waygate-resource", about = "Waygate demo resource server")]
struct Cli {
    /// Interface to listen on
    #[arg(long, default_value = "127.0.0.1")]
    interface: String,

    /// Port to listen on
    #[arg(long, env = "RS_PORT", default_value_t = 9300)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let args = Cli::parse();
    let config = ResourceConfig::from_env()?;

    let listener = TcpListener::bind((args.interface.as_str(), args.port))?;
    info!("Resource server listening on port {}", args.port);

    start_resource_server(listener, config).await
}
