/// Arweave Snapshot
///
/// An ETL pipeline mirroring chain data into flat, append-only datasets.
mod checkpoint;
mod cli;
mod etl;
mod models;
mod pipeline;
mod rpc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use checkpoint::{CheckpointStore, CHECKPOINT_FILE};
use cli::Cli;
use etl::load::SnapshotSink;
use pipeline::{Pipeline, PipelineConfig};
use rpc::{HttpLedgerClient, LedgerClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    cli.validate()?;

    let node_url = cli.resolve_node_url();
    let parallel = cli.resolve_parallel()?;

    println!("🚀 Starting Arweave Snapshot...");

    // Initialize node client and probe the endpoint
    let client = HttpLedgerClient::new(node_url.clone()).context("Failed to create node client")?;
    let info = client.node_info().await.context("Failed to connect to node endpoint")?;

    println!("✅ Connected to: {}", node_url);
    println!("🎯 Current tip height: {}", info.height);
    println!("📂 Output directory: {}", cli.output_dir.display());
    println!("📦 Parallelism: {} blocks per batch", parallel);

    // Open the dataset streams and the checkpoint pair
    let sink = SnapshotSink::open(&cli.output_dir).context("Failed to open dataset streams")?;
    let checkpoint = CheckpointStore::new(CHECKPOINT_FILE, cli.output_dir.join(CHECKPOINT_FILE));

    // Termination requests drain the in-flight batch before streams close
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, waiting for the in-flight batch to drain");
            signal_token.cancel();
        }
    });

    let config = PipelineConfig { parallel, poll_interval: Duration::from_secs(cli.poll_interval) };
    let pipeline = Pipeline::new(Arc::new(client), Arc::new(sink), checkpoint, config, shutdown);

    pipeline.run().await.context("Sync pipeline failed")?;

    println!("\n✨ Snapshot closed cleanly");

    Ok(())
}
