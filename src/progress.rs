//! Progress-callback trait for transfer events.
//!
//! Inject an [`Arc<dyn TransferProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while a document is uploaded, converted and downloaded.
//!
//! # Example
//!
//! ```rust
//! use drive_convert::{ByteRange, ConversionConfig, TransferProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
//!
//! struct ByteCounter {
//!     sent: AtomicU64,
//! }
//!
//! impl TransferProgressCallback for ByteCounter {
//!     fn on_chunk_sent(&self, _index: usize, _total_chunks: usize, range: &ByteRange) {
//!         self.sent.fetch_add(range.len(), Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(ByteCounter { sent: AtomicU64::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .client_id("id")
//!     .client_secret("secret")
//!     .tenant("common")
//!     .progress_callback(counter as Arc<dyn TransferProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::remote::session::ByteRange;
use crate::remote::TransferMode;
use std::sync::Arc;

/// Called by the remote handle as it moves a document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive in order from a single task.
pub trait TransferProgressCallback: Send + Sync {
    /// Called once before the first upload request.
    ///
    /// # Arguments
    /// * `artifact`    — remote name of the temporary file
    /// * `total_bytes` — length of the source document
    /// * `mode`        — single PUT or upload session
    fn on_upload_start(&self, artifact: &str, total_bytes: u64, mode: TransferMode) {
        let _ = (artifact, total_bytes, mode);
    }

    /// Called after each accepted chunk of a session upload.
    ///
    /// # Arguments
    /// * `index`        — 1-based chunk number
    /// * `total_chunks` — number of chunks in the upload
    /// * `range`        — bytes carried by this chunk
    fn on_chunk_sent(&self, index: usize, total_chunks: usize, range: &ByteRange) {
        let _ = (index, total_chunks, range);
    }

    /// Called once the service has accepted the whole document.
    fn on_upload_complete(&self, total_bytes: u64) {
        let _ = total_bytes;
    }

    /// Called when the converted rendition has been received.
    fn on_download_complete(&self, format: &str, bytes: u64) {
        let _ = (format, bytes);
    }

    /// Called after the temporary remote file was removed.
    fn on_remote_deleted(&self, artifact: &str) {
        let _ = artifact;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TransferProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn TransferProgressCallback>;
