//! serve-engine
//!
//! Serves a directory over HTTP.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 SERVE ENGINE                 │
//!   Client Request       │  ┌────────┐   ┌─────────┐   ┌────────────┐   │
//!   ─────────────────────┼─▶│  http  │──▶│ resolve │──▶│   rules    │   │
//!                        │  │ server │   │  paths  │   │ rewrite/3xx│   │
//!                        │  └────────┘   └────┬────┘   └────────────┘   │
//!                        │                    ▼                         │
//!                        │   ┌──────────┬─────────┬─────────┐          │
//!                        │   │ delivery │ listing │  exec   │  proxy ──┼──▶ Upstream
//!   Client Response      │   │ (files)  │ (dirs)  │(scripts)│          │
//!   ◀────────────────────┼───┴──────────┴─────────┴─────────┘          │
//!                        │                                              │
//!                        │  config (load, validate, watch) · lifecycle  │
//!                        │  observability (tracing, metrics)            │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use serve_engine::config::Settings;
use serve_engine::http::{HttpServer, ServeHandler};
use serve_engine::lifecycle::{bootstrap, watch_config, Overrides, Shutdown};
use serve_engine::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "serve-engine", version, about = "Serve a directory over HTTP")]
struct Cli {
    /// Directory to serve (defaults to the config's `public`, then the working directory).
    dir: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:3000.
    #[arg(short, long)]
    listen: Option<String>,

    /// Config file (defaults to serve.json or serve.toml in DIR).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rewrite every path to /index.html.
    #[arg(short, long)]
    single: bool,

    /// Follow symbolic links.
    #[arg(long)]
    symlinks: bool,

    /// Use Last-Modified instead of ETag validators.
    #[arg(long)]
    no_etag: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = Overrides {
        public: cli.dir.clone(),
        listen: cli.listen.clone(),
        single: cli.single,
        symlinks: cli.symlinks,
        no_etag: cli.no_etag,
    };
    let search_dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    let boot = bootstrap(cli.config.as_deref(), &search_dir, &overrides)?;
    let config = boot.config;

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "serve-engine starting");

    let settings = Settings::from_config(&config)?;
    tracing::info!(
        root = %settings.root.display(),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
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

    let handler = ServeHandler::builder(settings)
        .upstream_timeout(Duration::from_secs(config.timeouts.request_secs))
        .build()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (_watcher, settings_updates) = match &boot.config_path {
        Some(path) => match watch_config(path, overrides) {
            Ok((watcher, updates)) => (Some(watcher), updates),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Config watching disabled");
                (None, mpsc::unbounded_channel().1)
            }
        },
        None => (None, mpsc::unbounded_channel().1),
    };

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(handler, &config);
    server.run(listener, settings_updates, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
