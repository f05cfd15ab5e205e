//! SSR Nonce Gateway
//!
//! Stands in front of a server-side rendering origin and stamps a fresh
//! Content-Security-Policy nonce onto every rendered page.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  NONCE GATEWAY                    │
//!                         │                                                   │
//!     Client Request      │  ┌─────────┐   ┌─────────┐   ┌──────────────┐    │
//!     ────────────────────┼─▶│  http   │──▶│  nonce  │──▶│   context    │    │
//!                         │  │ server  │   │generator│   │   binder     │    │
//!                         │  └─────────┘   └─────────┘   └──────┬───────┘    │
//!                         │                                     │             │
//!                         │                                     ▼             │
//!                         │                              ┌──────────────┐    │      SSR
//!                         │                              │    render    │◀───┼──── Origin
//!                         │                              │    engine    │    │
//!                         │                              └──────┬───────┘    │
//!                         │                                     │             │
//!     Client Response     │  ┌─────────┐   ┌─────────┐   ┌──────▼───────┐    │
//!     ◀───────────────────┼──│  body   │◀──│ headers │◀──│    policy    │    │
//!                         │  │ rewrite │   │ (CSP +) │   │   builder    │    │
//!                         │  └─────────┘   └─────────┘   └──────────────┘    │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use ssr_nonce_gateway::config::load_config;
use ssr_nonce_gateway::http::HttpServer;
use ssr_nonce_gateway::lifecycle::{signals, Shutdown};
use ssr_nonce_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "ssr-nonce-gateway")]
#[command(about = "CSP nonce gateway for server-side rendered pages", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;

    logging::init(&config.observability.log_level);

    tracing::info!("ssr-nonce-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.origin,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Address validated at load time.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
