//! # drive-convert
//!
//! Convert documents (DOCX, ODT, PPTX, …) to PDF and other formats by
//! letting a cloud drive do the rendering.
//!
//! The conversion itself is opaque: the drive service renders any file it
//! stores when asked for `…/content?format=pdf`. This crate does the part
//! around it. It authenticates with the client-credentials grant, uploads the
//! source under a throw-away name (a single PUT up to 4 MiB, a resumable
//! upload session in 320 KiB ranges above that), downloads the rendition, and
//! deletes the temporary file again.
//!
//! ## Request Overview
//!
//! ```text
//! source file
//!  │
//!  ├─ 1. Local   open the file, learn its length
//!  ├─ 2. Token   POST client credentials → access_token (once per conversion)
//!  ├─ 3. Upload  PUT …:/content            (≤ 4 MiB)
//!  │             POST …:/createUploadSession + PUT ranges (> 4 MiB)
//!  ├─ 4. Render  GET …:/content?format=pdf
//!  ├─ 5. Clean   DELETE …                  (always attempted)
//!  └─ 6. Output  converted bytes + transfer stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drive_convert::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .client_id(std::env::var("DRIVE_CONVERT_CLIENT_ID")?)
//!         .client_secret(std::env::var("DRIVE_CONVERT_CLIENT_SECRET")?)
//!         .tenant(std::env::var("DRIVE_CONVERT_TENANT")?)
//!         .build()?;
//!     let (path, stats) = convert_to_file("report.docx", None, &config).await?;
//!     eprintln!("{} ({} bytes, {} upload)", path.display(), stats.downloaded_bytes, stats.mode);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `drive-convert` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! drive-convert = { version = "0.1", default-features = false }
//! ```
//!
//! ## Limitations
//!
//! The access token is fetched once per conversion and never refreshed.
//! Failed requests are not retried.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod local;
pub mod output;
pub mod progress;
pub mod remote;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    auth_url_for_tenant, ConversionConfig, ConversionConfigBuilder, TargetFormat, CHUNK_SIZE,
    MAX_SMALL_FILE_SIZE,
};
pub use convert::{convert, convert_file, convert_from_bytes, convert_sync, convert_to_file};
pub use error::ConvertError;
pub use local::{open_source, output_path_for, write_output, DocumentStream};
pub use output::{ConversionOutput, ConversionStats};
pub use progress::{NoopProgressCallback, ProgressCallback, TransferProgressCallback};
pub use remote::{ArtifactName, ByteRange, ChunkCursor, RemoteFile, TransferMode};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
