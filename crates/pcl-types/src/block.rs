use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::hash::BlockHash;

/// A block's opaque record: field name → value.
///
/// Fund and project data are stored verbatim so they can be replayed into the
/// hash computation and displayed.
pub type Payload = Map<String, Value>;

/// One immutable, ordered entry in a chain.
///
/// A block is created exactly once by an append and never updated through
/// the ledger API. Any later change to a stored block is tampering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, starting at 0 with no gaps.
    pub index: u64,
    /// Creation time in milliseconds since the UNIX epoch.
    pub timestamp: i64,
    /// The fund-release or project record.
    pub payload: Payload,
    /// Hash of the previous block, `None` for the genesis block.
    pub prev_hash: Option<BlockHash>,
    /// Digest over `(index, timestamp, canonical(payload), prev_hash)`.
    pub block_hash: BlockHash,
    /// Authenticity tag over `block_hash`, hex-encoded.
    pub signature: String,
    /// Stored columns that could not be decoded, kept verbatim.
    ///
    /// Always empty for blocks built by an append. A non-empty list means the
    /// stored row was edited out-of-band; the matching typed fields then hold
    /// placeholders and must not be trusted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub undecodable: Vec<Undecodable>,
}

/// A stored block column, named as in the relational layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockField {
    Index,
    Timestamp,
    Payload,
    PrevHash,
    BlockHash,
    Signature,
}

/// Raw text of a column that does not decode into its typed field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Undecodable {
    pub field: BlockField,
    pub raw: String,
}

impl Block {
    /// Returns `true` for the first block of a chain.
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Returns `true` if the stored form of `field` did not decode.
    pub fn is_undecodable(&self, field: BlockField) -> bool {
        self.undecodable.iter().any(|u| u.field == field)
    }
}

/// Convert an arbitrary JSON value into a payload.
///
/// Only objects are accepted: a payload is a field→value mapping.
pub fn payload_from_value(value: Value) -> Result<Payload, TypeError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Err(TypeError::PayloadNotObject("null")),
        Value::Bool(_) => Err(TypeError::PayloadNotObject("boolean")),
        Value::Number(_) => Err(TypeError::PayloadNotObject("number")),
        Value::String(_) => Err(TypeError::PayloadNotObject("string")),
        Value::Array(_) => Err(TypeError::PayloadNotObject("array")),
    }
}
