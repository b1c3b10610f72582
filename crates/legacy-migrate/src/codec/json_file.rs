//! JSON arrays of objects.

use crate::core::Record;
use crate::error::Result;

pub(super) fn encode(records: &[Record]) -> Result<Vec<u8>> {
    let mut out = serde_json::to_vec_pretty(records)?;
    out.push(b'\n');
    Ok(out)
}

pub(super) fn decode(bytes: &[u8]) -> Result<Vec<Record>> {
    Ok(serde_json::from_slice(bytes)?)
}
