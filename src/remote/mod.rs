//! Client for the drive service's item API.
//!
//! ## Request Flow
//!
//! ```text
//! token ──▶ [session] ──▶ PUT content / PUT chunks ──▶ GET ?format= ──▶ DELETE
//! (auth)    (large only)   (upload)                    (rendition)       (close)
//! ```
//!
//! 1. [`token`]   — client-credentials token, fetched once per handle
//! 2. [`session`] — upload-session URL and the byte-range cursor that drives
//!    chunked uploads
//! 3. [`file`]    — [`RemoteFile`], the temporary artifact: upload, download
//!    a rendition, delete

pub mod file;
pub mod session;
pub mod token;

pub use file::{ArtifactName, RemoteFile};
pub use session::{ByteRange, ChunkCursor, UploadSession};
pub use token::TokenCache;

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a document is sent to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// One PUT of the whole body to the item's content URL.
    Simple,
    /// Resumable upload session, one PUT per byte range.
    Chunked,
}

impl TransferMode {
    /// Pick the mode for a document of `len` bytes with a caller hint of
    /// `size_hint` bytes. Anything strictly above `limit` is chunked.
    ///
    /// An empty document is always sent whole: a session range cannot carry
    /// zero bytes, whatever the hint says.
    pub fn select(len: u64, size_hint: u64, limit: u64) -> Self {
        if len > 0 && (size_hint > limit || len > limit) {
            TransferMode::Chunked
        } else {
            TransferMode::Simple
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Simple => f.write_str("simple"),
            TransferMode::Chunked => f.write_str("chunked"),
        }
    }
}
