/// CLI Module
///
/// Command-line interface configuration using clap.
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

/// Node endpoint used when neither the flag nor ARWEAVE_NODE_URL is set.
pub const DEFAULT_NODE_URL: &str = "https://arweave.net";

/// Batch parallelism used when neither the flag nor PARALLEL is set.
pub const DEFAULT_PARALLEL: u64 = 8;

/// Arweave Snapshot - chain mirroring pipeline
///
/// Incrementally sync blocks, transactions, and tags into flat-file datasets
#[derive(Parser, Debug)]
#[command(name = "arweave-snapshot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Node endpoint URL (overrides ARWEAVE_NODE_URL env var)
    #[arg(short = 'u', long, value_name = "URL")]
    pub node_url: Option<String>,

    /// Directory the datasets and published checkpoint are written to
    #[arg(short = 'o', long, value_name = "DIR", default_value = "snapshot")]
    pub output_dir: PathBuf,

    /// Number of blocks ingested concurrently per batch (overrides PARALLEL env var)
    #[arg(short = 'p', long, value_name = "COUNT")]
    pub parallel: Option<u64>,

    /// Seconds to wait between tip checks once fully synced
    #[arg(long, value_name = "SECONDS", default_value = "30")]
    pub poll_interval: u64,
}

impl Cli {
    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.parallel == Some(0) {
            anyhow::bail!("Parallelism must be greater than 0");
        }

        if self.poll_interval == 0 {
            anyhow::bail!("Poll interval must be greater than 0");
        }

        Ok(())
    }

    /// Resolve the node endpoint: flag, then ARWEAVE_NODE_URL, then default.
    pub fn resolve_node_url(&self) -> String {
        self.node_url
            .clone()
            .or_else(|| std::env::var("ARWEAVE_NODE_URL").ok())
            .unwrap_or_else(|| DEFAULT_NODE_URL.to_string())
    }

    /// Resolve batch parallelism: flag, then PARALLEL, then the default.
    pub fn resolve_parallel(&self) -> anyhow::Result<u64> {
        if let Some(parallel) = self.parallel {
            return Ok(parallel);
        }

        match std::env::var("PARALLEL") {
            Ok(raw) => {
                let parallel =
                    raw.trim().parse::<u64>().context(format!("PARALLEL must be a positive integer, got {:?}", raw))?;
                if parallel == 0 {
                    anyhow::bail!("PARALLEL must be greater than 0");
                }
                Ok(parallel)
            }
            Err(_) => Ok(DEFAULT_PARALLEL),
        }
    }
}
