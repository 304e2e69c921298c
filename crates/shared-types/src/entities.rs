//! # Pipeline Entities
//!
//! ## Clusters
//!
//! - **Page views**: `PageViewEvent`
//! - **File transfer**: `FileChunkMessage`, `ArtifactDescriptor`
//! - **Routing**: `SubsystemId`

use serde::{Deserialize, Serialize};

use crate::errors::WireError;

// =============================================================================
// CLUSTER A: PAGE VIEWS
// =============================================================================

/// A single page view, keyed on the bus by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewEvent {
    /// User who viewed the page.
    pub user_id: String,
    /// Page name (e.g. "blog").
    pub page: String,
    /// Time spent on the page in milliseconds.
    pub duration: u64,
}

impl PageViewEvent {
    /// Create a new page view.
    pub fn new(user_id: impl Into<String>, page: impl Into<String>, duration: u64) -> Self {
        Self {
            user_id: user_id.into(),
            page: page.into(),
            duration,
        }
    }
}

// =============================================================================
// CLUSTER B: FILE TRANSFER
// =============================================================================

/// One positional fragment of a larger file, keyed on the bus by file id.
///
/// `page` is 1-based; `total_pages` is the number of chunks in the file.
/// `content` carries the chunk bytes as standard (RFC 4648) base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChunkMessage {
    /// Ordinal of this chunk (1-based).
    pub page: u32,
    /// Total number of chunks in the file.
    pub total_pages: u32,
    /// Base64-encoded chunk bytes.
    pub content: String,
}

impl FileChunkMessage {
    /// Create a new chunk message.
    pub fn new(page: u32, total_pages: u32, content: impl Into<String>) -> Self {
        Self {
            page,
            total_pages,
            content: content.into(),
        }
    }

    /// Decode a chunk message from its JSON wire form.
    pub fn from_json(bytes: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(bytes).map_err(|e| WireError::Malformed(e.to_string()))
    }

    /// Encode this chunk message to its JSON wire form.
    pub fn to_json(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(|e| WireError::Malformed(e.to_string()))
    }

    /// Whether this chunk claims to be the last one of its file.
    pub fn is_last(&self) -> bool {
        self.page == self.total_pages
    }
}

/// Description of a reconstructed file handed to an artifact sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// File identifier the chunks were keyed by.
    pub key: String,
    /// Name the artifact was written under.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Hex-encoded SHA-256 of the artifact bytes.
    pub sha256: String,
}

// =============================================================================
// CLUSTER C: ROUTING
// =============================================================================

/// Identifies the subsystem that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubsystemId {
    /// ap-01: synthetic page-view source and logger.
    PageViews,
    /// ap-02: chunk reassembly consumer.
    ChunkReassembly,
    /// The process runtime (bootstrap, demo publishing).
    Runtime,
}

impl SubsystemId {
    /// Short tag used in log lines and metric labels.
    pub fn tag(self) -> &'static str {
        match self {
            SubsystemId::PageViews => "ap-01",
            SubsystemId::ChunkReassembly => "ap-02",
            SubsystemId::Runtime => "runtime",
        }
    }
}

impl std::fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
