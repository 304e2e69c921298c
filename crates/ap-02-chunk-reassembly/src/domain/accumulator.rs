//! # Chunk Accumulator
//!
//! Per-key byte buffer plus cursor. Holds the in-progress reconstruction of
//! exactly one logical file at a time.
//!
//! ## Lifecycle
//!
//! ```text
//! Empty ──append(1..)──→ Accumulating ──append(n == total)──→ Complete
//!   ↑                                                            │
//!   └──────────────────────── reset() ───────────────────────────┘
//! ```
//!
//! The accumulator validates every append against what it has already seen
//! (declared total, next expected ordinal, size ceiling) and refuses to
//! write anything it cannot place. Reporting and discarding on error is the
//! engine's job.

use super::errors::{AccumulatorError, SequenceAnomaly};

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Where an accumulator is in its per-file lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// No bytes for the current file.
    Empty,
    /// Some chunks written, final chunk not yet seen.
    Accumulating,
    /// Final chunk written; waiting for a successful flush.
    Complete,
}

/// Outcome of a successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    /// More chunks are expected.
    Accumulating {
        /// Ordinal the next chunk must carry.
        next_ordinal: u32,
    },
    /// The chunk was the last one; the buffer holds the whole file.
    Complete,
}

/// Byte buffer and cursor for one key.
#[derive(Debug)]
pub struct ChunkAccumulator {
    buffer: Vec<u8>,
    cursor: usize,
    total: Option<u32>,
    next_ordinal: u32,
    state: AccumulatorState,
    max_bytes: usize,
    last_updated: Timestamp,
}

impl ChunkAccumulator {
    /// Create an empty accumulator that refuses to grow past `max_bytes`.
    pub fn new(max_bytes: usize, now: Timestamp) -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
            total: None,
            next_ordinal: 1,
            state: AccumulatorState::Empty,
            max_bytes,
            last_updated: now,
        }
    }

    /// Write already-decoded `payload` at the cursor and advance it.
    ///
    /// A single-chunk file (`ordinal == total == 1`) replaces the buffer
    /// outright. Any other chunk must carry the next expected ordinal and the
    /// total declared by the first chunk of the file.
    pub fn append(
        &mut self,
        payload: &[u8],
        ordinal: u32,
        total: u32,
    ) -> Result<AppendResult, AccumulatorError> {
        if ordinal > total {
            return Err(SequenceAnomaly::OrdinalExceedsTotal { ordinal, total }.into());
        }

        if ordinal == 1 && total == 1 {
            self.check_size(payload.len())?;
            self.buffer.clear();
            self.buffer.extend_from_slice(payload);
            self.cursor = payload.len();
            self.total = Some(1);
            self.next_ordinal = 2;
            self.state = AccumulatorState::Complete;
            return Ok(AppendResult::Complete);
        }

        self.check_sequence(ordinal, total)?;

        let end = self
            .cursor
            .checked_add(payload.len())
            .ok_or(AccumulatorError::Overflow {
                size: usize::MAX,
                max: self.max_bytes,
            })?;
        self.check_size(end)?;

        self.buffer.truncate(self.cursor);
        self.buffer.extend_from_slice(payload);
        self.cursor = end;
        self.total = Some(total);
        self.next_ordinal = ordinal + 1;

        if Self::is_complete(ordinal, total) {
            self.state = AccumulatorState::Complete;
            Ok(AppendResult::Complete)
        } else {
            self.state = AccumulatorState::Accumulating;
            Ok(AppendResult::Accumulating {
                next_ordinal: self.next_ordinal,
            })
        }
    }

    fn check_sequence(&self, ordinal: u32, total: u32) -> Result<(), SequenceAnomaly> {
        if let (AccumulatorState::Accumulating, Some(expected)) = (self.state, self.total) {
            if total != expected {
                return Err(SequenceAnomaly::TotalChanged {
                    expected,
                    got: total,
                });
            }
        }
        if ordinal != self.next_ordinal {
            return Err(SequenceAnomaly::OutOfOrder {
                expected: self.next_ordinal,
                got: ordinal,
            });
        }
        Ok(())
    }

    fn check_size(&self, size: usize) -> Result<(), AccumulatorError> {
        if size > self.max_bytes {
            return Err(AccumulatorError::Overflow {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }

    /// A chunk completes its file iff it declares `ordinal == total`.
    ///
    /// The byte count is not consulted: a stream that claims completion
    /// early gets flushed early.
    pub fn is_complete(ordinal: u32, total: u32) -> bool {
        ordinal == total
    }

    /// The accumulated bytes. Does not reset.
    pub fn flush(&self) -> &[u8] {
        &self.buffer[..self.cursor]
    }

    /// Drop the buffer and get ready for the next file under the same key.
    pub fn reset(&mut self) {
        self.buffer = Vec::new();
        self.cursor = 0;
        self.total = None;
        self.next_ordinal = 1;
        self.state = AccumulatorState::Empty;
    }

    /// Record activity at `now` (used for idle eviction).
    pub fn touch(&mut self, now: Timestamp) {
        self.last_updated = now;
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Bytes written so far.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total declared by the current file, if one is in progress.
    pub fn expected_total(&self) -> Option<u32> {
        self.total
    }

    pub fn next_ordinal(&self) -> u32 {
        self.next_ordinal
    }

    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }

    /// Idle for more than `timeout_secs` at `now`.
    pub fn is_idle(&self, now: Timestamp, timeout_secs: u64) -> bool {
        now.saturating_sub(self.last_updated) > timeout_secs
    }
}
