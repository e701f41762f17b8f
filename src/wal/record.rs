//! Log record definitions
//!
//! Defines a single key-value record and its on-disk frame.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Frame header: payload length (4) + CRC32 of payload (4)
pub const HEADER_SIZE: usize = 8;

/// A single `set` as it appears in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl LogRecord {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Encode into a complete frame: `[len][crc][bincode payload]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let crc = crc32fast::hash(&payload);

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        frame.put_u32_le(payload.len() as u32);
        frame.put_u32_le(crc);
        frame.put_slice(&payload);
        Ok(frame.to_vec())
    }

    /// Decode a payload whose checksum has already been verified
    pub fn deserialize(payload: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(payload)?)
    }
}
