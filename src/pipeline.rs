/// Pipeline Module
///
/// The synchronization engine. Drives bounded batches of heights through
/// block ingestion, fans each block out to its transactions, expands ANS-102
/// bundles one level deep, and advances the checkpoint only after every task
/// in a batch has resolved. Shutdown is cooperative: the in-flight batch
/// drains, the checkpoint is persisted, then the dataset streams are closed.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointStore;
use crate::etl::load::SnapshotSink;
use crate::etl::{extract, parsers, transform};
use crate::models::RescanKind;
use crate::rpc::LedgerClient;

/// Scheduler states. `ShuttingDown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    CatchingUp,
    AtTip,
    ShuttingDown,
}

/// Configuration for pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of heights ingested concurrently per batch.
    pub parallel: u64,
    /// Wait between tip queries once caught up.
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { parallel: 8, poll_interval: Duration::from_secs(30) }
    }
}

/// Main sync pipeline
pub struct Pipeline<C> {
    client: Arc<C>,
    sink: Arc<SnapshotSink>,
    checkpoint: CheckpointStore,
    config: PipelineConfig,
    shutdown: CancellationToken,
}

impl<C: LedgerClient> Pipeline<C> {
    /// Create a new pipeline instance
    pub fn new(
        client: Arc<C>,
        sink: Arc<SnapshotSink>,
        checkpoint: CheckpointStore,
        config: PipelineConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self { client, sink, checkpoint, config, shutdown }
    }

    /// Run the sync loop until shutdown is requested.
    ///
    /// Exactly one batch is in flight at any time; the checkpoint is written
    /// only here, after the whole batch has resolved.
    pub async fn run(&self) -> Result<()> {
        let mut next_height = match self.checkpoint.load()? {
            Some(checkpoint) => {
                tracing::info!("Existing snapshot state found at height {}, resuming sync", checkpoint);
                checkpoint + 1
            }
            None => {
                tracing::info!("No snapshot state found, generating a new snapshot from height 0");
                0
            }
        };

        let mut tip = self.client.node_info().await?.height;
        tracing::info!("Current chain tip is {}", tip);

        let bar = sync_progress_bar(next_height, tip);
        let mut state = if next_height <= tip { SyncState::CatchingUp } else { SyncState::AtTip };

        loop {
            match state {
                SyncState::CatchingUp => {
                    if self.shutdown.is_cancelled() {
                        state = SyncState::ShuttingDown;
                        continue;
                    }

                    let batch_len = self.config.parallel.min((tip + 1).saturating_sub(next_height));
                    if batch_len == 0 {
                        tracing::info!("Fully synced at height {}, monitoring for new blocks", tip);
                        state = SyncState::AtTip;
                        continue;
                    }

                    let heights = next_height..next_height + batch_len;
                    for result in join_all(heights.map(|height| self.ingest_block(height))).await {
                        result?;
                    }

                    next_height += batch_len;
                    self.checkpoint.save(next_height - 1)?;
                    bar.inc(batch_len);

                    if self.shutdown.is_cancelled() {
                        state = SyncState::ShuttingDown;
                    }
                }
                SyncState::AtTip => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {
                            state = SyncState::ShuttingDown;
                            continue;
                        }
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }

                    let info = self.client.node_info().await?;
                    if info.height > tip {
                        tracing::info!("Chain tip advanced from {} to {}, syncing new blocks", tip, info.height);
                        bar.set_length(info.height);
                        state = SyncState::CatchingUp;
                    }
                    tip = info.height;
                }
                SyncState::ShuttingDown => {
                    bar.finish_and_clear();
                    self.sink.close()?;
                    tracing::info!("Shutdown complete, dataset streams closed");
                    return Ok(());
                }
            }
        }
    }

    /// Ingest one block: fetch it (retrying until shutdown), write its row,
    /// then fan out to every referenced transaction and wait for all of them.
    /// A block is done only once each of its transactions has been written or
    /// logged to rescan. `Err` means a local sink failure and aborts the sync.
    async fn ingest_block(&self, height: u64) -> Result<()> {
        let Some(block) = extract::fetch_block(self.client.as_ref(), height, &self.shutdown).await else {
            return Ok(());
        };

        self.sink.write_block(&transform::format_block_row(&block))?;

        // Genesis carries no transactions to fan out.
        if height > 0 {
            for result in join_all(block.txs.iter().map(|id| self.ingest_transaction(id, height))).await {
                result?;
            }
        }

        Ok(())
    }

    /// Ingest one transaction under the once-retry policy. An exhausted fetch
    /// is recorded to the rescan dataset and is not an error to the caller.
    async fn ingest_transaction(&self, id: &str, height: u64) -> Result<()> {
        let tx = match extract::fetch_transaction(self.client.as_ref(), id).await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!("Could not retrieve tx {} at height {}, missing tx stored in rescan: {}", id, height, e);
                return self.sink.write_rescan(&transform::format_rescan_row(id, height, RescanKind::Normal));
            }
        };

        self.sink.write_transaction(&transform::format_transaction_row(&tx, height))?;

        for (index, tag) in tx.tags.iter().enumerate() {
            self.sink.write_tag(&transform::format_tag_row(&tx.id, index, tag))?;
        }

        if transform::is_bundle_container(&tx.tags) {
            self.expand_bundle(&tx.id, height).await?;
        }

        Ok(())
    }

    /// Expand an ANS-102 container one level deep: fetch and decode its
    /// payload under the once-retry policy, then persist every item with the
    /// container's height. Items are never re-examined for nested bundles.
    async fn expand_bundle(&self, container_id: &str, height: u64) -> Result<()> {
        let client = self.client.as_ref();

        let items = match extract::retry_once(move || async move {
            let payload = client.chunked_payload(container_id).await?;
            Ok(parsers::decode_bundle(&payload)?)
        })
        .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Malformed ANS payload at height {} for tx {}: {}", height, container_id, e);
                return self.sink.write_rescan(&transform::format_rescan_row(container_id, height, RescanKind::Ans));
            }
        };

        for item in &items {
            self.sink.write_transaction(&transform::format_bundle_item_row(item, height))?;

            for (index, tag) in item.tags.iter().enumerate() {
                self.sink.write_tag(&transform::format_tag_row(&item.id, index, tag))?;
            }
        }

        Ok(())
    }
}

fn sync_progress_bar(position: u64, tip: u64) -> ProgressBar {
    let bar = ProgressBar::new(tip);
    bar.set_position(position);
    bar.set_style(ProgressStyle::with_template("[syncing blocks] {wide_bar} {pos}/{len}").unwrap());
    bar
}
