/// Load Module
///
/// Owns the append-only dataset streams the ingestors write to. Each stream
/// is buffered and guarded by its own lock; a row is appended under one short
/// lock that is never held across an await, so concurrent ingestion tasks
/// cannot interleave partial rows.
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};

pub const BLOCK_DATASET: &str = "block.csv";
pub const TRANSACTION_DATASET: &str = "transaction.csv";
pub const TAGS_DATASET: &str = "tags.csv";
pub const RESCAN_DATASET: &str = "rescan.csv";

pub struct SnapshotSink {
    block: Mutex<BufWriter<File>>,
    transaction: Mutex<BufWriter<File>>,
    tags: Mutex<BufWriter<File>>,
    rescan: Mutex<BufWriter<File>>,
}

impl SnapshotSink {
    /// Open the four dataset streams under `output_dir`, creating the
    /// directory and any missing files. Existing files are appended to.
    pub fn open(output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .context(format!("Failed to create output directory {}", output_dir.display()))?;

        Ok(Self {
            block: open_stream(output_dir, BLOCK_DATASET)?,
            transaction: open_stream(output_dir, TRANSACTION_DATASET)?,
            tags: open_stream(output_dir, TAGS_DATASET)?,
            rescan: open_stream(output_dir, RESCAN_DATASET)?,
        })
    }

    pub fn write_block(&self, row: &str) -> Result<()> {
        append(&self.block, row, BLOCK_DATASET)
    }

    pub fn write_transaction(&self, row: &str) -> Result<()> {
        append(&self.transaction, row, TRANSACTION_DATASET)
    }

    pub fn write_tag(&self, row: &str) -> Result<()> {
        append(&self.tags, row, TAGS_DATASET)
    }

    pub fn write_rescan(&self, row: &str) -> Result<()> {
        append(&self.rescan, row, RESCAN_DATASET)
    }

    /// Flush and sync every stream so trailing rows survive process exit.
    pub fn close(&self) -> Result<()> {
        for (stream, name) in [
            (&self.block, BLOCK_DATASET),
            (&self.transaction, TRANSACTION_DATASET),
            (&self.tags, TAGS_DATASET),
            (&self.rescan, RESCAN_DATASET),
        ] {
            let mut writer = stream.lock().unwrap();
            writer.flush().context(format!("Failed to flush {}", name))?;
            writer.get_ref().sync_all().context(format!("Failed to sync {}", name))?;
        }

        tracing::info!("Dataset streams flushed and closed");
        Ok(())
    }
}

fn open_stream(output_dir: &Path, name: &str) -> Result<Mutex<BufWriter<File>>> {
    let path = output_dir.join(name);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .context(format!("Failed to open dataset {}", path.display()))?;

    Ok(Mutex::new(BufWriter::new(file)))
}

fn append(stream: &Mutex<BufWriter<File>>, row: &str, name: &str) -> Result<()> {
    stream.lock().unwrap().write_all(row.as_bytes()).context(format!("Failed to append to {}", name))
}
