//! tablelog-server — verifiable transparency logs over table rows.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tablelog_server::http::router;
use tablelog_server::storage::SqliteStore;
use tablelog_server::submission::ApiKeyValidator;
use tablelog_server::{AppState, ServerConfig};

/// tablelog-server — RFC 6962-style logs for tabular data
#[derive(Parser, Debug)]
#[command(name = "tablelog-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("reading configuration")?;

    let store = Arc::new(
        SqliteStore::open(&config.db_path)
            .with_context(|| format!("opening store at {}", config.db_path.display()))?,
    );

    let state = AppState::new(
        config.account.clone(),
        Arc::clone(&store) as Arc<dyn tablelog_server::storage::StorageWriter>,
        store as Arc<dyn tablelog_server::storage::VerifiableLog>,
        Arc::new(ApiKeyValidator::new(config.write_api_key.clone())),
        config.table_names.clone(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, account = %config.account, "serving verifiable logs");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    info!("shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = ctrl_c => info!("received interrupt, shutting down"),
        _ = term.recv() => info!("received SIGTERM, shutting down"),
    }
}
