#[macro_use]
extern crate tracing;

use std::net::TcpListener;

use anyhow::{Context, Result};
use clap::Parser;

use waygate_authorizer::{start_authorizer, AuthorizerConfig, DelegationStore};
use waygate_core::tracing::initialize_tracing;

#[derive(Parser)]
#[command(name = "waygate-authorizer", about = "Waygate delegation store and policy evaluator")]
struct Cli {
    /// Interface to listen on
    #[arg(long, default_value = "127.0.0.1")]
    interface: String,

    /// Port to listen on
    #[arg(long, env = "ADP_PORT", default_value_t = 9400)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let args = Cli::parse();
    let config = AuthorizerConfig::from_env()?;

    let store = DelegationStore::open(&config.db_path)
        .with_context(|| format!("could not open delegation store at {:?}", config.db_path))?;

    let listener = TcpListener::bind((args.interface.as_str(), args.port))?;
    info!("Authorizer listening on port {}", args.port);

    start_authorizer(listener, store, config.strict).await
}
