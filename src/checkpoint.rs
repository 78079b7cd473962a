/// Checkpoint Module
///
/// Persists the last fully-ingested height across restarts. Two copies are
/// kept in lockstep: a working copy next to the process and a published copy
/// inside the output directory for external consumers. Both hold the same
/// ASCII decimal value; the published copy is the one read back at startup.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// File name used for both checkpoint copies.
pub const CHECKPOINT_FILE: &str = ".checkpoint";

pub struct CheckpointStore {
    working: PathBuf,
    published: PathBuf,
}

impl CheckpointStore {
    /// Create a store over the given working and published copies.
    pub fn new(working: impl Into<PathBuf>, published: impl Into<PathBuf>) -> Self {
        Self { working: working.into(), published: published.into() }
    }

    /// Read the published checkpoint.
    ///
    /// Returns `None` when no checkpoint exists yet (a new snapshot). A file
    /// that does not parse as a non-negative integer is an error; the caller
    /// must not guess a starting height.
    pub fn load(&self) -> Result<Option<u64>> {
        if !self.published.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.published)
            .context(format!("Failed to read checkpoint {}", self.published.display()))?;

        let height = raw
            .trim()
            .parse::<u64>()
            .context(format!("Malformed checkpoint in {}: {:?}", self.published.display(), raw.trim()))?;

        Ok(Some(height))
    }

    /// Durably record `height` in both copies, working copy first.
    pub fn save(&self, height: u64) -> Result<()> {
        write_value(&self.working, height)?;
        write_value(&self.published, height)?;

        tracing::debug!("Checkpoint advanced to {}", height);
        Ok(())
    }
}

fn write_value(path: &Path, height: u64) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .context(format!("Failed to open checkpoint {}", path.display()))?;

    file.write_all(height.to_string().as_bytes())
        .context(format!("Failed to write checkpoint {}", path.display()))?;
    file.sync_all().context(format!("Failed to sync checkpoint {}", path.display()))?;

    Ok(())
}
