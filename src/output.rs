//! Result types returned by the conversion entry points.

use crate::config::TargetFormat;
use crate::remote::TransferMode;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The converted document plus what it took to get it.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Converted document bytes.
    pub bytes: Bytes,
    /// Format of `bytes`.
    pub format: TargetFormat,
    /// Transfer statistics.
    pub stats: ConversionStats,
}

/// Per-conversion statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Name of the temporary remote artifact.
    pub artifact: String,
    /// How the source was uploaded.
    pub mode: TransferMode,
    /// Source document size.
    pub uploaded_bytes: u64,
    /// Number of PUT requests carrying document bytes.
    pub upload_requests: usize,
    /// Size of the converted rendition.
    pub downloaded_bytes: u64,
    /// Whether the remote artifact was removed afterwards.
    pub remote_deleted: bool,
    pub upload_duration_ms: u64,
    pub download_duration_ms: u64,
    pub total_duration_ms: u64,
}
