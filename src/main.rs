//! Server-side render runtime.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ static files (public/)
//!                          │
//!                          ▼
//!                    routing::router ──▶ middleware chain
//!                          │
//!                          ▼
//!                    render::pipeline ──▶ cache hit ──▶ document envelope ──▶ client
//!                          │
//!                          ▼ miss
//!          server data ∥ layouts ──▶ page ──▶ engine ──▶ tee ─┬─▶ live ──▶ client
//!                                                             └─▶ cache fill
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use render_runtime::config::{default_config, load_config};
use render_runtime::http::action::ActionRegistry;
use render_runtime::lifecycle::{preload_all, signals, Shutdown};
use render_runtime::observability::{logging, metrics};
use render_runtime::routing::Router;
use render_runtime::{pages, HttpServer, Runtime};

#[derive(Parser)]
#[command(name = "render-runtime")]
#[command(about = "Server-side render runtime with a streaming response cache", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;
    tracing::info!("render-runtime v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        cache_capacity = config.cache.capacity,
        cache_ttl_secs = config.cache.ttl_secs,
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

    let mut builder = Router::builder();
    let mut actions = ActionRegistry::new();
    pages::register(&mut builder, &mut actions)?;
    let router = builder.build();
    tracing::info!(routes = router.all_routes().len(), actions = actions.len(), "Routes registered");

    let bind_address = config.listener.bind_address.clone();
    let runtime = Arc::new(Runtime::new(config, router, actions));
    preload_all(&runtime).await;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_handler(shutdown.clone());

    let server = HttpServer::new(runtime);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
