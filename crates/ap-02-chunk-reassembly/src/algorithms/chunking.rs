//! # Chunk Splitting
//!
//! Producer side of the chunk protocol: cuts a file into `chunk_size` byte
//! pieces, numbers them `1..=N` with `totalPages = N`, and base64-encodes
//! each piece with the standard alphabet.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use shared_bus::PipelineEvent;
use shared_types::FileChunkMessage;

use crate::domain::errors::ChunkingError;

/// Split `data` into ordered chunk messages.
///
/// Empty input yields one chunk with empty content, so an empty file still
/// produces an (empty) artifact.
pub fn split_into_chunks(
    data: &[u8],
    chunk_size: usize,
) -> Result<Vec<FileChunkMessage>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::ZeroChunkSize);
    }

    if data.is_empty() {
        return Ok(vec![FileChunkMessage::new(1, 1, String::new())]);
    }

    let count = data.len().div_ceil(chunk_size);
    let total = u32::try_from(count).map_err(|_| ChunkingError::TooManyChunks {
        chunks: count,
        max: u32::MAX,
    })?;

    Ok(data
        .chunks(chunk_size)
        .zip(1..=total)
        .map(|(piece, page)| FileChunkMessage::new(page, total, BASE64.encode(piece)))
        .collect())
}

/// Split `data` and wrap each chunk as a bus event keyed by `key`.
pub fn chunk_events(
    key: &str,
    data: &[u8],
    chunk_size: usize,
) -> Result<Vec<PipelineEvent>, ChunkingError> {
    Ok(split_into_chunks(data, chunk_size)?
        .into_iter()
        .map(|chunk| PipelineEvent::FileChunkReceived {
            key: key.to_string(),
            chunk,
        })
        .collect())
}
