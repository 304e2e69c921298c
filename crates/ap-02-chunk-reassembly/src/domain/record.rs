//! # Chunk Records
//!
//! The engine's view of an inbound chunk: the bus key joined with the
//! positional fields of the wire message.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use shared_types::FileChunkMessage;

use super::errors::ReassemblyError;

/// One positional fragment of a logical file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    /// File identifier.
    pub key: String,
    /// 1-based position of this chunk.
    pub ordinal: u32,
    /// Number of chunks the file was split into.
    pub total: u32,
    /// Standard base64 payload, still encoded.
    pub payload: String,
}

impl ChunkRecord {
    /// Create a record without validation.
    pub fn new(key: impl Into<String>, ordinal: u32, total: u32, payload: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ordinal,
            total,
            payload: payload.into(),
        }
    }

    /// Build a record from a keyed wire message.
    ///
    /// Rejects an empty key and zero positions. `page > totalPages` passes
    /// here; the engine reports it against the key.
    pub fn from_message(key: impl Into<String>, msg: FileChunkMessage) -> Result<Self, ReassemblyError> {
        let key = key.into();

        if key.is_empty() {
            return Err(ReassemblyError::InvalidRecord {
                key,
                reason: "empty key".to_string(),
            });
        }
        if msg.page == 0 {
            return Err(ReassemblyError::InvalidRecord {
                key,
                reason: "page must be at least 1".to_string(),
            });
        }
        if msg.total_pages == 0 {
            return Err(ReassemblyError::InvalidRecord {
                key,
                reason: "totalPages must be at least 1".to_string(),
            });
        }

        Ok(Self {
            key,
            ordinal: msg.page,
            total: msg.total_pages,
            payload: msg.content,
        })
    }

    /// Decode the payload to raw bytes.
    pub fn decode_payload(&self) -> Result<Vec<u8>, ReassemblyError> {
        BASE64
            .decode(self.payload.as_bytes())
            .map_err(|e| ReassemblyError::Decode {
                key: self.key.clone(),
                ordinal: self.ordinal,
                total: self.total,
                reason: e.to_string(),
            })
    }

    /// `ordinal == total == 1`.
    pub fn is_single_chunk(&self) -> bool {
        self.ordinal == 1 && self.total == 1
    }

    /// The chunk declares itself the last of its file.
    pub fn is_final(&self) -> bool {
        self.ordinal == self.total
    }
}
