/// Extract Module
///
/// Retry wrappers around the node client. Blocks are mandatory for chain
/// continuity and are refetched until they arrive or shutdown is requested;
/// transactions and bundle payloads get exactly one retry before the caller
/// degrades them to the rescan dataset. The two policies are deliberately
/// different and must stay that way.
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::models::{Block, Transaction};
use crate::rpc::LedgerClient;

/// Pause between failed block fetch attempts.
const BLOCK_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Fetch a block, retrying until it arrives or `shutdown` is cancelled.
///
/// Returns `None` only when shutdown was requested mid-retry; the caller then
/// resolves without writing output for this height.
pub async fn fetch_block<C: LedgerClient>(client: &C, height: u64, shutdown: &CancellationToken) -> Option<Block> {
    loop {
        if shutdown.is_cancelled() {
            tracing::debug!("Abandoning block fetch at height {}: shutdown requested", height);
            return None;
        }

        match client.block_by_height(height).await {
            Ok(block) => return Some(block),
            Err(e) => {
                tracing::warn!("Could not retrieve block at height {}, retrying: {}", height, e);
                sleep(BLOCK_RETRY_DELAY).await;
            }
        }
    }
}

/// Run `attempt` up to two times, returning the second error when both fail.
pub async fn retry_once<T, F, Fut>(mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match attempt().await {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!("Fetch failed, attempting to retrieve again: {}", e);
            attempt().await
        }
    }
}

/// Fetch a transaction under the once-retry policy.
pub async fn fetch_transaction<C: LedgerClient>(client: &C, id: &str) -> Result<Transaction> {
    retry_once(move || client.transaction(id)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::{block, MockLedgerClient};
    use std::cell::Cell;

    #[tokio::test]
    async fn test_retry_once_first_attempt_succeeds() {
        let calls = Cell::new(0u32);

        let result = retry_once(|| {
            calls.set(calls.get() + 1);
            async { Ok(7) }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retry_once_recovers_from_one_failure() {
        let calls = Cell::new(0u32);

        let result = retry_once(|| {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt == 1 {
                    anyhow::bail!("transient")
                }
                Ok("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_retry_once_gives_up_after_two_attempts() {
        let calls = Cell::new(0u32);

        let result: Result<()> = retry_once(|| {
            calls.set(calls.get() + 1);
            async { anyhow::bail!("down") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_block_retries_until_success() {
        let client = MockLedgerClient::with_tip(10);
        client.add_block(block(5, &[]));
        client.fail_block(5, 4);

        let shutdown = CancellationToken::new();
        let fetched = fetch_block(&client, 5, &shutdown).await;

        assert_eq!(fetched.unwrap().height, 5);
        assert_eq!(client.block_calls.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_fetch_block_abandons_on_shutdown() {
        let client = MockLedgerClient::with_tip(10);

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        assert!(fetch_block(&client, 5, &shutdown).await.is_none());
        assert!(client.block_calls.lock().unwrap().is_empty());
    }
}
