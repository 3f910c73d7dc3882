//! Conversion entry points.
//!
//! Every entry point funnels into [`convert`], which runs one remote round
//! trip: upload the source, download the rendition, delete the temporary
//! artifact. Requests are strictly sequential; the download is only issued
//! after the service has accepted the last upload request.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::local::{self, DocumentStream};
use crate::output::{ConversionOutput, ConversionStats};
use crate::remote::session::ChunkCursor;
use crate::remote::{RemoteFile, TransferMode};
use crate::transport::{HttpTransport, ReqwestTransport};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Convert a document stream through the remote service.
///
/// The remote artifact is deleted before this returns, on success and on
/// failure alike, whenever an upload request was issued.
///
/// # Errors
/// Returns the first upload or download failure unchanged. A failed delete
/// after a successful conversion does not fail the call; it is logged and
/// reported as `stats.remote_deleted == false`.
pub async fn convert(
    mut input: DocumentStream,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let total_start = Instant::now();
    config.validate()?;
    let transport = resolve_transport(config)?;

    let extension = input
        .extension()
        .map(str::to_string)
        .unwrap_or_else(|| config.source_extension.clone());
    let mut remote = RemoteFile::with_extension(config, transport, &extension);
    let artifact = remote.name().to_string();
    info!(
        "Starting conversion: {} bytes → {} via {}",
        input.len(),
        config.target_format,
        artifact
    );

    let result = round_trip(&mut remote, &mut input, config).await;

    // ── Cleanup runs on every path ───────────────────────────────────────
    let cleanup = remote.close().await;
    if let Err(ref e) = cleanup {
        warn!("Remote file {} could not be deleted: {}", artifact, e);
    }

    let trip = result?;
    let stats = ConversionStats {
        artifact,
        mode: trip.mode,
        uploaded_bytes: input.len(),
        upload_requests: upload_requests(trip.mode, input.len(), config.chunk_size),
        downloaded_bytes: trip.bytes.len() as u64,
        remote_deleted: cleanup.is_ok(),
        upload_duration_ms: trip.upload_ms,
        download_duration_ms: trip.download_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} → {} bytes in {}ms",
        stats.uploaded_bytes, stats.downloaded_bytes, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        bytes: trip.bytes,
        format: config.target_format,
        stats,
    })
}

/// Convert a local file. The artifact takes the file's extension.
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let input = local::open_source(path).await?;
    convert(input, config).await
}

/// Convert a local file and write the result next to it (or to `output_path`).
///
/// Without an explicit output path the input's extension is replaced by the
/// target format's, e.g. `report.docx` → `report.pdf`.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &ConversionConfig,
) -> Result<(PathBuf, ConversionStats), ConvertError> {
    let input_path = input_path.as_ref();
    let output = convert_file(input_path, config).await?;
    let target = match output_path {
        Some(p) => p.to_path_buf(),
        None => local::output_path_for(input_path, output.format),
    };

    let bytes = output.bytes;
    let written = tokio::task::spawn_blocking(move || local::write_output(&target, &bytes))
        .await
        .map_err(|e| ConvertError::Internal(format!("write task failed: {e}")))??;

    Ok((written, output.stats))
}

/// Convert in-memory document bytes.
pub async fn convert_from_bytes(
    bytes: impl Into<Bytes>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    convert(DocumentStream::from_bytes(bytes), config).await
}

/// Synchronous wrapper around [`convert_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_file(path, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct RoundTrip {
    mode: TransferMode,
    bytes: Bytes,
    upload_ms: u64,
    download_ms: u64,
}

async fn round_trip(
    remote: &mut RemoteFile,
    input: &mut DocumentStream,
    config: &ConversionConfig,
) -> Result<RoundTrip, ConvertError> {
    let upload_start = Instant::now();
    let mode = remote.upload(input).await?;
    let upload_ms = upload_start.elapsed().as_millis() as u64;

    let download_start = Instant::now();
    let bytes = remote.download(config.target_format).await?;
    let download_ms = download_start.elapsed().as_millis() as u64;

    Ok(RoundTrip {
        mode,
        bytes,
        upload_ms,
        download_ms,
    })
}

fn upload_requests(mode: TransferMode, len: u64, chunk_size: u64) -> usize {
    match mode {
        TransferMode::Simple => 1,
        TransferMode::Chunked => ChunkCursor::new(len, chunk_size).chunk_count().max(1),
    }
}

/// Use the caller's transport if one was configured, else a reqwest client.
fn resolve_transport(config: &ConversionConfig) -> Result<Arc<dyn HttpTransport>, ConvertError> {
    if let Some(ref transport) = config.transport {
        return Ok(Arc::clone(transport));
    }
    Ok(Arc::new(ReqwestTransport::new(config.request_timeout_secs)?))
}
