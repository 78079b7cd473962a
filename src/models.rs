/// Data Models Module
///
/// This module defines the core data structures used throughout the application.
/// These models represent chain data as served by the node HTTP API (blocks,
/// transactions, tags, ANS-102 bundle items) and the rescan record kinds used
/// by the snapshot datasets.
use serde::{Deserialize, Serialize};

/// Node `/info` response. Only the tip height is read by the sync engine.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfo {
    pub height: u64,
}

/// A block as returned by `/block/height/{height}`.
///
/// Fields the pipeline does not format explicitly are captured in `extended`
/// and written out as a single JSON column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub indep_hash: String,
    /// Absent on the genesis block.
    #[serde(default)]
    pub previous_block: String,
    pub timestamp: u64,
    pub height: u64,
    #[serde(default)]
    pub txs: Vec<String>,
    #[serde(flatten)]
    pub extended: serde_json::Map<String, serde_json::Value>,
}

/// A name/value tag. The node serves both parts base64url-encoded; the client
/// decodes them before they reach the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// A transaction as returned by `/tx/{id}`.
///
/// String-typed numeric fields (`reward`, `quantity`, `data_size`) are kept
/// verbatim; the datasets carry them through unparsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub format: Option<u64>,
    pub id: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub reward: String,
    #[serde(default)]
    pub last_tx: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub data_size: String,
    #[serde(default)]
    pub data_root: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// `/tx/{id}/offset` response. The node serves both numbers as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct TxOffset {
    pub size: String,
    pub offset: String,
}

/// `/chunk/{offset}` response; `chunk` is base64url-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkData {
    pub chunk: String,
}

/// A transaction-shaped record recovered from an ANS-102 bundle payload.
///
/// Bundle items carry no height of their own; they are persisted with the
/// containing transaction's height.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataItem {
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Why an item landed in the rescan dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescanKind {
    /// A plain transaction that failed both fetch attempts.
    Normal,
    /// A bundle payload that could not be fetched or decoded.
    Ans,
}

impl RescanKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Normal => "normal",
            Self::Ans => "ans",
        }
    }
}
