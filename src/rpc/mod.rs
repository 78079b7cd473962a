/// RPC Client Module
///
/// This module handles all interactions with the chain node over its HTTP API.
/// The `LedgerClient` trait is the seam the sync engine depends on; the
/// `HttpLedgerClient` implementation wraps reqwest and speaks the node's
/// info, block, transaction, and chunk endpoints.
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::models::{Block, ChunkData, NodeInfo, Tag, Transaction, TxOffset};

/// Operations the sync engine needs from a chain node.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current tip information.
    async fn node_info(&self) -> Result<NodeInfo>;

    /// Fetch the block at `height`.
    async fn block_by_height(&self, height: u64) -> Result<Block>;

    /// Fetch a transaction by id, with tags decoded to UTF-8.
    async fn transaction(&self, id: &str) -> Result<Transaction>;

    /// Reassemble a transaction's full data payload from its chunks.
    async fn chunked_payload(&self, id: &str) -> Result<Vec<u8>>;
}

pub struct HttpLedgerClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpLedgerClient {
    /// Create a new client for the specified node endpoint
    pub fn new(endpoint: String) -> Result<Self> {
        let http = reqwest::Client::builder().build().context("Failed to build HTTP client")?;

        Ok(Self { http, endpoint: endpoint.trim_end_matches('/').to_string() })
    }

    /// Get the endpoint URL this client is connected to
    #[allow(dead_code)]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.endpoint, path);
        let response = self.http.get(&url).send().await.context(format!("Request to {} failed", url))?;
        let response = response.error_for_status().context(format!("Node returned an error for {}", url))?;

        response.json::<T>().await.context(format!("Failed to decode response from {}", url))
    }
}

/// Decode a base64url (unpadded) field into UTF-8 text.
fn decode_field(encoded: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).context("Field is not valid base64url")?;
    String::from_utf8(bytes).context("Field is not valid UTF-8")
}

/// Decode every tag's name and value as served by the node.
pub fn decode_tags(tags: Vec<Tag>) -> Result<Vec<Tag>> {
    tags.into_iter()
        .map(|tag| Ok(Tag { name: decode_field(&tag.name)?, value: decode_field(&tag.value)? }))
        .collect()
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn node_info(&self) -> Result<NodeInfo> {
        self.get_json("info").await
    }

    async fn block_by_height(&self, height: u64) -> Result<Block> {
        tracing::debug!("Fetching block at height {}", height);

        let block = self.get_json(&format!("block/height/{}", height)).await?;

        tracing::debug!("Successfully fetched block at height {}", height);
        Ok(block)
    }

    async fn transaction(&self, id: &str) -> Result<Transaction> {
        tracing::debug!("Fetching transaction {}", id);

        let mut tx: Transaction = self.get_json(&format!("tx/{}", id)).await?;
        tx.tags = decode_tags(tx.tags).context(format!("Transaction {} has undecodable tags", id))?;

        Ok(tx)
    }

    async fn chunked_payload(&self, id: &str) -> Result<Vec<u8>> {
        let info: TxOffset = self.get_json(&format!("tx/{}/offset", id)).await?;
        let size: u64 = info.size.parse().context("Offset response has a malformed size")?;
        let end_offset: u64 = info.offset.parse().context("Offset response has a malformed offset")?;

        // First chunk starts at end_offset - size + 1; walk forward until the
        // declared size is covered.
        let start_offset = end_offset
            .checked_sub(size.saturating_sub(1))
            .context(format!("Offset response for {} is inconsistent", id))?;

        let mut payload = Vec::with_capacity(size as usize);
        let mut byte = 0u64;

        while byte < size {
            let chunk: ChunkData = self.get_json(&format!("chunk/{}", start_offset + byte)).await?;
            let decoded = URL_SAFE_NO_PAD.decode(&chunk.chunk).context("Chunk is not valid base64url")?;

            if decoded.is_empty() {
                bail!("Node returned an empty chunk at offset {}", start_offset + byte);
            }

            byte += decoded.len() as u64;
            payload.extend_from_slice(&decoded);
        }

        tracing::debug!("Reassembled {} bytes of chunked data for {}", payload.len(), id);
        Ok(payload)
    }
}

#[cfg(test)]
pub mod mock {
    //! Mock ledger client for testing.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::{bail, Context};

    use super::*;

    /// In-memory node with scripted per-item failure counts.
    #[derive(Default)]
    pub struct MockLedgerClient {
        pub tip: Mutex<u64>,
        pub blocks: Mutex<HashMap<u64, Block>>,
        pub transactions: Mutex<HashMap<String, Transaction>>,
        pub payloads: Mutex<HashMap<String, Vec<u8>>>,
        /// Remaining failures to inject before a fetch succeeds.
        pub block_failures: Mutex<HashMap<u64, u32>>,
        pub tx_failures: Mutex<HashMap<String, u32>>,
        pub payload_failures: Mutex<HashMap<String, u32>>,
        /// Recorded calls.
        pub block_calls: Mutex<Vec<u64>>,
        pub tx_calls: Mutex<Vec<String>>,
        pub payload_calls: Mutex<Vec<String>>,
        pub info_calls: AtomicUsize,
    }

    impl MockLedgerClient {
        pub fn with_tip(tip: u64) -> Self {
            let client = Self::default();
            *client.tip.lock().unwrap() = tip;
            client
        }

        pub fn add_block(&self, block: Block) {
            self.blocks.lock().unwrap().insert(block.height, block);
        }

        pub fn add_transaction(&self, tx: Transaction) {
            self.transactions.lock().unwrap().insert(tx.id.clone(), tx);
        }

        pub fn add_payload(&self, id: &str, payload: Vec<u8>) {
            self.payloads.lock().unwrap().insert(id.to_string(), payload);
        }

        pub fn fail_block(&self, height: u64, times: u32) {
            self.block_failures.lock().unwrap().insert(height, times);
        }

        pub fn fail_transaction(&self, id: &str, times: u32) {
            self.tx_failures.lock().unwrap().insert(id.to_string(), times);
        }

        pub fn fail_payload(&self, id: &str, times: u32) {
            self.payload_failures.lock().unwrap().insert(id.to_string(), times);
        }
    }

    /// Build a block with the given transaction ids and no extended metadata.
    pub fn block(height: u64, txs: &[&str]) -> Block {
        Block {
            indep_hash: format!("block-{}", height),
            previous_block: if height == 0 { String::new() } else { format!("block-{}", height - 1) },
            timestamp: 1_600_000_000 + height,
            height,
            txs: txs.iter().map(|id| id.to_string()).collect(),
            extended: serde_json::Map::new(),
        }
    }

    /// Build a transaction with already-decoded tags.
    pub fn transaction(id: &str, tags: &[(&str, &str)]) -> Transaction {
        Transaction {
            id: id.to_string(),
            signature: format!("sig-{}", id),
            owner: "b3duZXI".to_string(),
            reward: "100".to_string(),
            quantity: "0".to_string(),
            tags: tags
                .iter()
                .map(|(name, value)| Tag { name: name.to_string(), value: value.to_string() })
                .collect(),
            ..Transaction::default()
        }
    }

    fn take_failure(failures: &Mutex<HashMap<u64, u32>>, height: u64) -> bool {
        match failures.lock().unwrap().get_mut(&height) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn take_failure_by_id(failures: &Mutex<HashMap<String, u32>>, id: &str) -> bool {
        match failures.lock().unwrap().get_mut(id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    #[async_trait]
    impl LedgerClient for MockLedgerClient {
        async fn node_info(&self) -> Result<NodeInfo> {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            Ok(NodeInfo { height: *self.tip.lock().unwrap() })
        }

        async fn block_by_height(&self, height: u64) -> Result<Block> {
            self.block_calls.lock().unwrap().push(height);

            if take_failure(&self.block_failures, height) {
                bail!("injected block failure at height {}", height);
            }

            self.blocks.lock().unwrap().get(&height).cloned().context(format!("no block at height {}", height))
        }

        async fn transaction(&self, id: &str) -> Result<Transaction> {
            self.tx_calls.lock().unwrap().push(id.to_string());

            if take_failure_by_id(&self.tx_failures, id) {
                bail!("injected transaction failure for {}", id);
            }

            self.transactions.lock().unwrap().get(id).cloned().context(format!("no transaction {}", id))
        }

        async fn chunked_payload(&self, id: &str) -> Result<Vec<u8>> {
            self.payload_calls.lock().unwrap().push(id.to_string());

            if take_failure_by_id(&self.payload_failures, id) {
                bail!("injected payload failure for {}", id);
            }

            self.payloads.lock().unwrap().get(id).cloned().context(format!("no payload for {}", id))
        }
    }
}
