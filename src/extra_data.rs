//! Extra-data envelope attached to transfers.
//!
//! The contract's `bytes _extraData` argument is an opaque field that other
//! clients may fill with anything. This client writes a tagged envelope into
//! it:
//!
//! ```text
//! 0x 544c4d50 <MessagePack map>
//!    "TLMP"   { "paymentRequestId": bin, "transferId": bin }
//! ```
//!
//! Only the present fields are written to the map. Data that does not start
//! with the tag is not ours, and [`decode`] returns `None` for it instead of
//! failing.
//!
//! Decoding under a matching tag is total: if the remainder is not hex, not a
//! MessagePack value, or not a map, the result is `None`. A map yields
//! `Some`, keeping every recognised key whose value is binary (or a hex
//! string) and skipping everything else. Bytes after the map are ignored.

use crate::error::{Result, TlError};
use rmpv::Value;
use serde::{Deserialize, Serialize};

/// `b"TLMP"`
pub const MAGIC_TAG: [u8; 4] = [0x54, 0x4c, 0x4d, 0x50];
pub const MAGIC_TAG_HEX: &str = "0x544c4d50";
/// Hex for "no extra data".
pub const EMPTY_EXTRA_DATA: &str = "0x";

const PAYMENT_REQUEST_ID_KEY: &str = "paymentRequestId";
const TRANSFER_ID_KEY: &str = "transferId";
/// Decoder depth budget. rmpv charges str and bin payloads a level each, so
/// a flat map of scalars needs five; anything much deeper is foreign.
const MAX_NESTING: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<String>,
}

impl ExtraData {
    pub fn with_payment_request_id(id: impl Into<String>) -> Self {
        Self {
            payment_request_id: Some(id.into()),
            transfer_id: None,
        }
    }

    pub fn with_transfer_id(id: impl Into<String>) -> Self {
        Self {
            payment_request_id: None,
            transfer_id: Some(id.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payment_request_id.is_none() && self.transfer_id.is_none()
    }
}

/// Encode to a `0x`-prefixed hex string. An empty record encodes to
/// [`EMPTY_EXTRA_DATA`].
pub fn encode(extra_data: &ExtraData) -> Result<String> {
    Ok(format!("0x{}", hex::encode(encode_bytes(extra_data)?)))
}

/// Encode to the raw bytes placed in the transaction's data slot.
pub fn encode_bytes(extra_data: &ExtraData) -> Result<Vec<u8>> {
    let mut entries = Vec::with_capacity(2);
    if let Some(id) = &extra_data.payment_request_id {
        entries.push((
            Value::from(PAYMENT_REQUEST_ID_KEY),
            Value::Binary(id_to_bytes(id, PAYMENT_REQUEST_ID_KEY)?),
        ));
    }
    if let Some(id) = &extra_data.transfer_id {
        entries.push((
            Value::from(TRANSFER_ID_KEY),
            Value::Binary(id_to_bytes(id, TRANSFER_ID_KEY)?),
        ));
    }
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let mut buf = MAGIC_TAG.to_vec();
    rmpv::encode::write_value(&mut buf, &Value::Map(entries))
        .map_err(|e| TlError::Serialization(format!("extra data: {}", e)))?;
    Ok(buf)
}

/// Decode a hex string read from a transfer. Never fails; see the module
/// docs for what `None` and a partial record mean.
pub fn decode(encoded: &str) -> Option<ExtraData> {
    let digits = strip_hex_prefix(encoded.trim());
    let tag = digits.get(..MAGIC_TAG_HEX.len() - 2)?;
    if !tag.eq_ignore_ascii_case(&MAGIC_TAG_HEX[2..]) {
        return None;
    }
    let payload = hex::decode(&digits[tag.len()..]).ok()?;
    decode_payload(&payload)
}

/// Same as [`decode`], for data that is already raw bytes.
pub fn decode_bytes(data: &[u8]) -> Option<ExtraData> {
    decode_payload(data.strip_prefix(&MAGIC_TAG[..])?)
}

/// [`decode`] for callers that treat foreign data as an error.
pub fn try_decode(encoded: &str) -> Result<ExtraData> {
    decode(encoded).ok_or(TlError::UnrecognizedFormat)
}

fn decode_payload(mut payload: &[u8]) -> Option<ExtraData> {
    let value = rmpv::decode::read_value_with_max_depth(&mut payload, MAX_NESTING).ok()?;
    let entries = match value {
        Value::Map(entries) => entries,
        _ => return None,
    };

    let mut extra_data = ExtraData::default();
    for (key, value) in entries {
        let slot = match key.as_str() {
            Some(PAYMENT_REQUEST_ID_KEY) => &mut extra_data.payment_request_id,
            Some(TRANSFER_ID_KEY) => &mut extra_data.transfer_id,
            _ => continue,
        };
        if let Some(bytes) = field_bytes(&value) {
            *slot = Some(format!("0x{}", hex::encode(bytes)));
        }
    }
    Some(extra_data)
}

fn field_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Binary(bytes) if !bytes.is_empty() => Some(bytes.clone()),
        Value::String(s) => s
            .as_str()
            .and_then(|s| hex::decode(strip_hex_prefix(s)).ok())
            .filter(|bytes| !bytes.is_empty()),
        _ => None,
    }
}

fn id_to_bytes(id: &str, field: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(strip_hex_prefix(id))
        .map_err(|e| TlError::invalid_argument(format!("{} {:?} is not hex: {}", field, id, e)))?;
    if bytes.is_empty() {
        return Err(TlError::invalid_argument(format!("{} is empty", field)));
    }
    Ok(bytes)
}

pub(crate) fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
