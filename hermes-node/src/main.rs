//! Hermes channel node HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p hermes-node --release
//!
//! # Run with custom config path
//! cargo run -p hermes-node -- --config /path/to/config.toml
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p hermes-node
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to TOML configuration file (default: `config.toml`)
//! - `HOST` — Override bind address (default: `0.0.0.0`)
//! - `PORT` — Override port (default: `4031`)
//! - `RUST_LOG` — Log level filter (default: `info`)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::Method;
use clap::Parser;
use tokio::sync::Mutex;
use tower_http::cors;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use hermes_node::config::NodeConfig;
use hermes_node::{ChannelNode, NodeState, node_router};

#[derive(Debug, Parser)]
#[command(name = "hermes-node", version, about = "Hermes payment channel node")]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, env = "CONFIG", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("Node failed: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = NodeConfig::load(&args.config)?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        channel = %config.channel_address,
        delay_blocks = config.channel.delay_blocks,
        intermediaries = config.intermediaries.len(),
        pools = config.pools.len(),
        "Loaded configuration"
    );

    if config.intermediaries.is_empty() {
        tracing::warn!("No intermediaries configured, the channel cannot be initialized");
    }

    let node = ChannelNode::from_config(&config)?;
    let state: NodeState = Arc::new(Mutex::new(node));

    let app = node_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Node listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Node shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
            },
            Err(e) => {
                tracing::warn!("Cannot install SIGTERM handler: {e}");
                if let Err(e) = ctrl_c.await {
                    tracing::error!("Cannot listen for Ctrl-C: {e}");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            tracing::error!("Cannot listen for Ctrl-C: {e}");
            return;
        }
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
