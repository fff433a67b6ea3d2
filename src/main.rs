//! Competition portal server.
//!
//! ```text
//!   client ──▶ request-id ─▶ trace ─▶ timeout ─▶ GATE ─▶ /api handlers ─▶ Store
//!                                               │                         │
//!                              rate limit ◀─────┤              Supabase REST / memory
//!                              session    ◀─────┤
//!                              policy     ◀─────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use competition_portal::config::loader::{config_from_env, load_config};
use competition_portal::config::watcher::ConfigWatcher;
use competition_portal::lifecycle::{signals, startup, Shutdown};
use competition_portal::observability::{logging, metrics};
use competition_portal::{HttpServer, PortalConfig};

#[derive(Parser, Debug)]
#[command(name = "competition-portal")]
#[command(about = "Student competition listing and registration service")]
struct Args {
    /// Path to a TOML config file. Without one, defaults and SUPABASE_* env vars are used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override server.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Reload the gate section when the config file changes.
    #[arg(long, default_value_t = false)]
    watch: bool,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    let mut config: PortalConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => config_from_env()?,
    };
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!("competition-portal v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.server.bind_address,
        backend = ?config.database.backend,
        rate_limit = config.gate.rate_limit.max_requests,
        window_secs = config.gate.rate_limit.window_secs,
        privileged = config.gate.privileged_emails.len(),
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

    let backends = startup::build_backends(&config.database)?;

    // Keep the watcher alive for the life of the process.
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path, &config);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let tls = config.server.tls.clone();
    let bind_address = config.server.bind_address.clone();
    let server = HttpServer::new(config, backends.store, backends.identity);

    let serving = async move {
        match tls {
            Some(tls) => {
                let addr: SocketAddr = bind_address.parse()?;
                let rustls = competition_portal::net::tls::load_tls_config(&tls).await?;
                server.run_tls(addr, rustls, config_updates, server_shutdown).await?;
            }
            None => {
                let listener = TcpListener::bind(&bind_address).await?;
                server.run(listener, config_updates, server_shutdown).await?;
            }
        }
        Ok::<(), BoxError>(())
    };
    let server_task = tokio::spawn(serving);

    signals::wait_for_shutdown().await;
    shutdown.trigger();

    match server_task.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "Server task panicked"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
