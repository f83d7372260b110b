//! tablelog-pipeline — pulls upstream rows into verifiable logs.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tablelog_pipeline::db::Database;
use tablelog_pipeline::jobs::{run_workers, PipelineContext, ResourceArgs, FETCH_ENTRY_METADATA};
use tablelog_pipeline::queue::JobQueue;
use tablelog_pipeline::source::SourceClient;
use tablelog_pipeline::submitter::LogSubmitter;
use tablelog_pipeline::PipelineConfig;

/// tablelog-pipeline — durable submission worker
#[derive(Parser, Debug)]
#[command(name = "tablelog-pipeline")]
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

    let config = PipelineConfig::from_env().context("reading configuration")?;

    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening pipeline db at {}", config.db_path.display()))?;
    let queue = JobQueue::new(db.clone(), config.queue_name.clone());

    // One probe per resource, idempotently, before workers start.
    for resource in &config.resource_ids {
        queue
            .enqueue_unique(
                FETCH_ENTRY_METADATA,
                &ResourceArgs {
                    resource: resource.clone(),
                },
            )
            .context("bootstrapping probe jobs")?;
    }
    info!(resources = config.resource_ids.len(), "bootstrap complete");

    if let Some(port) = config.health_port {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("binding health port {port}"))?;
        tokio::spawn(async move {
            let app = axum::Router::new().route("/", axum::routing::get(|| async { "HEALTHY" }));
            let _ = axum::serve(listener, app).await;
        });
    }

    let ctx = Arc::new(PipelineContext {
        queue,
        db,
        source: SourceClient::new(config.source_base_url.clone()),
        submitter: LogSubmitter::new(
            config.log_server.clone(),
            config.log_api_key.clone(),
            config.table_names.clone(),
        ),
        table_names: config.table_names.clone(),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received interrupt, shutting down"),
            _ = term.recv() => info!("received SIGTERM, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    info!(workers = config.workers, "workers starting");
    run_workers(ctx, config.workers, shutdown_rx).await;
    info!("shutdown complete");
    Ok(())
}
