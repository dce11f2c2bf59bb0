#[macro_use]
extern crate tracing;

use std::net::TcpListener;

use anyhow::Result;
use clap::Parser;

use waygate_authserver::{start_authserver, AuthServerConfig};
use waygate_core::tracing::initialize_tracing;

#[derive(Parser)]
#[command(name = "waygate-authserver", about = "Waygate demo authorization server")]
struct Cli {
    /// Interface to listen on
    #[arg(long, default_value = "127.0.0.1")]
    interface: String,

    /// Port to listen on
    #[arg(long, env = "AS_PORT", default_value_t = 9200)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let args = Cli::parse();
    let config = AuthServerConfig::from_env()?;

    let listener = TcpListener::bind((args.interface.as_str(), args.port))?;
    info!("Authorization server listening on port {}", args.port);

    start_authserver(listener, config).await
}
