use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use voter_auth::config::loader::default_config;
use voter_auth::config::load_config;
use voter_auth::lifecycle::{build_state, signals};
use voter_auth::observability::{logging, metrics};
use voter_auth::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "voter-auth", version, about = "Voter authentication and election API")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "voter-auth starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        ledger = ?config.ledger.backend,
        blockchain = config.blockchain.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = build_state(&config).await?;
    let store = state.store.clone();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    HttpServer::new(state, &config).run(listener, shutdown).await?;

    if let Err(e) = store.save_to_file() {
        tracing::error!(error = %e, "Failed to save user store");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
