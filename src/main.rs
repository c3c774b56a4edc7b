//! Edge security gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ set request id ──▶ trace ──▶ body limit ──▶ timeout
//!                                                              │
//!            ┌─────────────────────────────────────────────────┤
//!            ▼                         ▼                       ▼
//!      GET /api/csrf        POST /api/auth/session       everything else
//!      (mint token)         (session relay)              guard: rate limit
//!                                  │                          → anti-forgery
//!                                  ▼                          → forward
//!                           identity provider                   │
//!                                                               ▼
//!                                                          upstream app
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::load_with_env;
use edge_gateway::lifecycle::{wait_for_shutdown_signal, Shutdown};
use edge_gateway::observability::{logging, metrics};
use edge_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "Edge security gateway: anti-forgery tokens, rate limiting, session relay", long_about = None)]
struct Args {
    /// TOML configuration file; defaults plus GATEWAY_* variables when omitted
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, warnings) = load_with_env(args.config.as_deref())?;
    logging::init_logging(&config.observability);
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "edge-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config);

    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    wait_for_shutdown_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
