//! # Key Partitioning
//!
//! Deterministic key to worker assignment: `Keccak256(key) % partitions`.
//! Every record for one key lands on the same worker, which keeps per-key
//! delivery order intact without cross-worker locking.

use sha3::{Digest, Keccak256};

/// Worker index for `key` among `partitions` workers.
///
/// Returns 0 when `partitions` is 0 or 1.
pub fn assign_partition(key: &str, partitions: usize) -> usize {
    if partitions <= 1 {
        return 0;
    }

    let hash = Keccak256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    let value = u64::from_be_bytes(prefix);

    (value % partitions as u64) as usize
}
