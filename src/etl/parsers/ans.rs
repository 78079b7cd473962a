/// ANS-102 Bundle Decoder
///
/// Decodes the payload of a `Bundle-Type: ANS-102` container transaction into
/// its data items. The payload is UTF-8 JSON of the shape `{"items": [...]}`;
/// item tag names and values arrive base64url-encoded and are decoded here so
/// downstream rows carry readable text.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use thiserror::Error;

use crate::models::{DataItem, Tag};

/// Errors raised while decoding an ANS-102 payload.
#[derive(Debug, Error)]
pub enum BundleError {
    /// Payload bytes are not UTF-8 text.
    #[error("Bundle payload is not UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// Payload text is not the expected JSON shape.
    #[error("Bundle payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An item carries no id to key its rows by.
    #[error("Bundle item at position {0} has no id")]
    MissingId(usize),

    /// A tag name or value could not be decoded.
    #[error("Bundle item {id} has an undecodable tag: {reason}")]
    Tag { id: String, reason: String },
}

#[derive(Deserialize)]
struct Bundle {
    items: Vec<DataItem>,
}

/// Decode an ANS-102 payload into its data items, in payload order.
pub fn decode_bundle(payload: &[u8]) -> Result<Vec<DataItem>, BundleError> {
    let text = std::str::from_utf8(payload)?;
    let bundle: Bundle = serde_json::from_str(text)?;

    bundle
        .items
        .into_iter()
        .enumerate()
        .map(|(position, mut item)| {
            if item.id.is_empty() {
                return Err(BundleError::MissingId(position));
            }

            item.tags = decode_item_tags(&item.id, item.tags)?;
            Ok(item)
        })
        .collect()
}

fn decode_item_tags(id: &str, tags: Vec<Tag>) -> Result<Vec<Tag>, BundleError> {
    tags.into_iter()
        .map(|tag| {
            let name = decode_text(&tag.name).map_err(|reason| BundleError::Tag { id: id.to_string(), reason })?;
            let value = decode_text(&tag.value).map_err(|reason| BundleError::Tag { id: id.to_string(), reason })?;

            Ok(Tag { name, value })
        })
        .collect()
}

fn decode_text(encoded: &str) -> Result<String, String> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}
