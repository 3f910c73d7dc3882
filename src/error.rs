//! Error types for the drive-convert library.
//!
//! Every fatal condition is a [`ConvertError`] variant. The remote-call
//! variants are grouped by what went wrong rather than by which endpoint was
//! hit, so a caller can match on the category (service down, garbage reply,
//! upload rejected) and read `operation` for the details:
//!
//! * [`ConvertError::ServiceUnreachable`] — no usable response from the
//!   authentication, upload-session, download or delete endpoint.
//! * [`ConvertError::MalformedResponse`] — a response arrived but the JSON
//!   field we need (`access_token`, `uploadUrl`) was missing.
//! * [`ConvertError::TransferFailed`] — a whole-file or chunk PUT did not
//!   complete.
//!
//! Nothing is retried; the first failure ends the conversion.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the drive-convert library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Local input errors ────────────────────────────────────────────────
    /// Source file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    NotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the source stream failed part-way through an upload.
    #[error("Failed to read source document: {source}")]
    SourceRead {
        #[source]
        source: std::io::Error,
    },

    // ── Remote errors ─────────────────────────────────────────────────────
    /// A remote call returned no usable response (transport failure or an
    /// unexpected HTTP status).
    #[error("Service unreachable during {operation}: {reason}")]
    ServiceUnreachable {
        operation: &'static str,
        reason: String,
    },

    /// A successful-looking response lacked the expected JSON field.
    #[error("Malformed response from {operation}: missing field '{field}'")]
    MalformedResponse {
        operation: &'static str,
        field: &'static str,
    },

    /// A whole-file or chunk upload did not complete.
    #[error("Upload failed: {reason}")]
    TransferFailed { reason: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the converted output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub(crate) fn unreachable(operation: &'static str, reason: impl ToString) -> Self {
        ConvertError::ServiceUnreachable {
            operation,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn transfer(reason: impl ToString) -> Self {
        ConvertError::TransferFailed {
            reason: reason.to_string(),
        }
    }

    /// True for the categories produced by talking to the remote service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ConvertError::ServiceUnreachable { .. }
                | ConvertError::MalformedResponse { .. }
                | ConvertError::TransferFailed { .. }
        )
    }
}
