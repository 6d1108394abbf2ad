//! JSON wire codec for node records

use crate::error::{Error, Result};
use crate::record::NodeRecord;

/// Media type of every request and response body
pub const MEDIA_TYPE: &str = "application/json";

/// Serialize a record for the wire
pub fn encode_record(record: &NodeRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(Error::Encode)
}

/// Parse a record received from a peer
pub fn decode_record(bytes: &[u8]) -> Result<NodeRecord> {
    serde_json::from_slice(bytes).map_err(Error::Decode)
}
