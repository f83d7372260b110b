//! tablelog — operator and auditor CLI for verifiable logs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tablelog_client::{AuditClient, LogClient};

mod audit;

/// tablelog — verify what a log operator promised
#[derive(Parser, Debug)]
#[command(name = "tablelog")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk every entry and verify the recomputed root against the STH
    Audit {
        /// Base URL of the log, e.g. https://host/dataset/<table>
        #[arg(long)]
        url: String,
    },

    /// Fetch and verify a signed tree head
    Sth {
        /// Base URL of the log
        #[arg(long)]
        url: String,

        /// Tree size to fetch; defaults to the current head
        #[arg(long)]
        size: Option<u64>,
    },

    /// Print the log's public key and derived log ID
    Metadata {
        /// Base URL of the log
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Audit { url } => {
            let client = LogClient::new(url, "");
            let report = audit::audit_log(&client).await?;
            println!(
                "audit OK: {} entries fold to root {} (tree size {}, timestamp {})",
                report.entries,
                hex::encode(report.sth.root_hash),
                report.sth.tree_size,
                report.sth.timestamp,
            );
        },

        Commands::Sth { url, size } => {
            let client = LogClient::new(url, "");
            let sth = client
                .get_sth(size)
                .await
                .context("fetching signed tree head")?;
            println!("tree size: {}", sth.tree_size);
            println!("timestamp: {}", sth.timestamp);
            println!("root hash: {}", hex::encode(sth.root_hash));
            println!("signature verified");
        },

        Commands::Metadata { url } => {
            let client = LogClient::new(url, "");
            let der = client
                .fetch_public_key_der()
                .await
                .context("fetching metadata")?;
            let log_id: [u8; 32] = Sha256::digest(&der).into();
            println!("public key ({} DER bytes)", der.len());
            println!("log id: {}", hex::encode(log_id));
        },
    }

    Ok(())
}
