//! subhub: subscription aggregation service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http server ──▶ pipeline ──▶ context (token / profile)
//!                                    │
//!                                    ├──▶ cache ──▶ aggregator ──▶ remote sources
//!                                    │               (links, transform)
//!                                    │
//!                                    ├──▶ format negotiation
//!                                    │
//!                                    ├──▶ subconverter ──▶ conversion backends
//!                                    │        (callback URL back to /sub)
//!                                    │
//!                                    └──▶ services (notify, access log, counters)
//!
//!     store (JSON data file) ──▶ watcher ──▶ cache flush
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use subhub::config::load_or_default;
use subhub::lifecycle::Shutdown;
use subhub::observability::{logging, metrics};
use subhub::store::{FileStore, StoreEvent, StoreWatcher};
use subhub::HttpServer;

#[derive(Parser)]
#[command(name = "subhub")]
#[command(about = "Subscription aggregation service", long_about = None)]
struct Args {
    /// Service configuration file (TOML). Defaults apply when it is missing.
    #[arg(short, long, env = "SUBHUB_CONFIG", default_value = "subhub.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(&args.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "subhub starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        store = %config.store.path,
        request_timeout_secs = config.timeouts.request_secs,
        cache_fresh_secs = config.cache.fresh_secs,
        admin_enabled = config.admin.enabled,
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

    let store = Arc::new(FileStore::open(&config.store.path)?);
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let server = HttpServer::new(config, store.clone());
    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    // The watcher must stay alive for as long as events are wanted.
    let (watcher, mut events) = StoreWatcher::new(store);
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "Store watcher unavailable, external edits need a restart");
            None
        }
    };

    let cache = server.cache();
    let mut watcher_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(StoreEvent::Changed) => {
                        let flushed = cache.flush();
                        tracing::info!(flushed, "Node cache flushed after store change");
                    }
                    None => break,
                },
                _ = watcher_shutdown.recv() => break,
            }
        }
    });

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
