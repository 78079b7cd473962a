/// Transform Module
///
/// Turns fetched records into the flat-file row shapes of the snapshot
/// datasets. Quote characters embedded in the JSON-bearing columns are
/// escaped as \" so existing consumers of these files keep parsing them
/// unchanged.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

use crate::models::{Block, DataItem, RescanKind, Tag, Transaction};

/// Column order of the transaction dataset.
///
/// `height` renders the ingestion height; every other column renders the
/// record's field, or an empty string when the record does not carry it.
pub const TRANSACTION_FIELDS: &[&str] = &[
    "format",
    "id",
    "signature",
    "owner",
    "owner_address",
    "target",
    "reward",
    "last_tx",
    "height",
    "tags",
    "quantity",
    "content_type",
    "data_size",
    "data_root",
];

/// Escape embedded quote characters for the flat-file format.
pub fn escape_quotes(input: &str) -> String {
    input.replace('"', "\\\"")
}

/// Look up a tag value by name.
pub fn tag_value<'a>(tags: &'a [Tag], name: &str) -> Option<&'a str> {
    tags.iter().find(|tag| tag.name == name).map(|tag| tag.value.as_str())
}

/// An ANS-102 bundle container is marked by this exact tag pair.
pub fn is_bundle_container(tags: &[Tag]) -> bool {
    tag_value(tags, "Bundle-Type") == Some("ANS-102")
}

/// Derive the owner address: base64url(SHA-256(decoded owner key)).
pub fn owner_address(owner: &str) -> Option<String> {
    if owner.is_empty() {
        return None;
    }

    let key = URL_SAFE_NO_PAD.decode(owner).ok()?;
    Some(URL_SAFE_NO_PAD.encode(Sha256::digest(key)))
}

/// Format a block into its dataset row:
/// `"id","previous_id","mined_at","height","txs_json","extended_json"`.
pub fn format_block_row(block: &Block) -> String {
    let txs_json = serde_json::to_string(&block.txs).unwrap_or_default();
    let extended_json = serde_json::to_string(&block.extended).unwrap_or_default();

    format!(
        "\"{}\",\"{}\",\"{}\",\"{}\",\"{}\",\"{}\"\n",
        block.indep_hash,
        block.previous_block,
        block.timestamp,
        block.height,
        escape_quotes(&txs_json),
        escape_quotes(&extended_json)
    )
}

fn transaction_field(tx: &Transaction, field: &str, height: u64) -> String {
    match field {
        "format" => tx.format.map(|f| f.to_string()).unwrap_or_default(),
        "id" => tx.id.clone(),
        "signature" => tx.signature.clone(),
        "owner" => tx.owner.clone(),
        "owner_address" => owner_address(&tx.owner).unwrap_or_default(),
        "target" => tx.target.clone(),
        "reward" => tx.reward.clone(),
        "last_tx" => tx.last_tx.clone(),
        "height" => height.to_string(),
        "tags" => escape_quotes(&serde_json::to_string(&tx.tags).unwrap_or_default()),
        "quantity" => tx.quantity.clone(),
        "content_type" => tag_value(&tx.tags, "Content-Type").unwrap_or_default().to_string(),
        "data_size" => tx.data_size.clone(),
        "data_root" => tx.data_root.clone(),
        _ => String::new(),
    }
}

/// Format a transaction into its dataset row, substituting the ingestion
/// height for the height column.
pub fn format_transaction_row(tx: &Transaction, height: u64) -> String {
    let fields: Vec<String> =
        TRANSACTION_FIELDS.iter().map(|field| format!("\"{}\"", transaction_field(tx, field, height))).collect();

    format!("{}\n", fields.join(","))
}

/// Format a bundle item into the transaction dataset's column layout.
///
/// Items carry the container's height; fields a data item does not have
/// render as empty strings.
pub fn format_bundle_item_row(item: &DataItem, height: u64) -> String {
    let tx = Transaction {
        id: item.id.clone(),
        signature: item.signature.clone(),
        owner: item.owner.clone(),
        target: item.target.clone(),
        tags: item.tags.clone(),
        ..Transaction::default()
    };

    format_transaction_row(&tx, height)
}

/// Format a tag into its dataset row: `"transaction_id","index","name","value"`.
pub fn format_tag_row(transaction_id: &str, index: usize, tag: &Tag) -> String {
    format!("\"{}\",\"{}\",\"{}\",\"{}\"\n", transaction_id, index, tag.name, tag.value)
}

/// Format a rescan entry: `item_id,height,kind`, unquoted.
pub fn format_rescan_row(item_id: &str, height: u64, kind: RescanKind) -> String {
    format!("{},{},{}\n", item_id, height, kind.as_str())
}
