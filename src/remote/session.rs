//! Upload sessions and byte-range bookkeeping for chunked uploads.
//!
//! A session is created once per artifact and its `uploadUrl` reused for every
//! chunk. Ranges are end-inclusive, matching `Content-Range` semantics:
//! a chunk starting at `start` carrying `n` bytes ends at `start + n - 1`.

use crate::error::ConvertError;
use crate::transport::{HttpRequest, HttpTransport};
use reqwest::header::{self, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info};

const OPERATION: &str = "upload session creation";

/// One contiguous, end-inclusive slice of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64, total: u64) -> Self {
        debug_assert!(start <= end && end < total);
        Self { start, end, total }
    }

    /// Number of bytes in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value, e.g. `bytes 0-327679/1000000`.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }

    pub fn is_last(&self) -> bool {
        self.end + 1 == self.total
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content_range())
    }
}

/// Walks `[0, total)` in `chunk_size` steps.
///
/// Every yielded range is `chunk_size` long except possibly the last, which
/// holds the remainder. An exact multiple yields `total / chunk_size` full
/// ranges and no empty tail.
#[derive(Debug, Clone)]
pub struct ChunkCursor {
    offset: u64,
    chunk_size: u64,
    total: u64,
}

impl ChunkCursor {
    pub fn new(total: u64, chunk_size: u64) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            offset: 0,
            chunk_size,
            total,
        }
    }

    /// Number of ranges the cursor yields in total.
    pub fn chunk_count(&self) -> usize {
        self.total.div_ceil(self.chunk_size) as usize
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Iterator for ChunkCursor {
    type Item = ByteRange;

    fn next(&mut self) -> Option<ByteRange> {
        if self.offset >= self.total {
            return None;
        }
        let end = (self.offset + self.chunk_size).min(self.total) - 1;
        let range = ByteRange::new(self.offset, end, self.total);
        self.offset = end + 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.offset).div_ceil(self.chunk_size) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ChunkCursor {}

#[derive(Debug, Serialize)]
struct CreateSessionBody {
    item: SessionItem,
}

#[derive(Debug, Serialize)]
struct SessionItem {
    #[serde(rename = "@microsoft.graph.conflictBehavior")]
    conflict_behavior: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    upload_url: Option<String>,
    #[serde(default)]
    expiration_date_time: Option<String>,
}

/// Lazily-created upload session for one artifact.
#[derive(Debug, Default)]
pub struct UploadSession {
    upload_url: Option<String>,
    creations: usize,
}

impl UploadSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session URL for `item_url`, creating the session on first use.
    ///
    /// `item_url` is the artifact's path-addressed URL
    /// (`{base}/{artifact}`); the request goes to
    /// `{item_url}:/createUploadSession`.
    pub async fn upload_url(
        &mut self,
        transport: &dyn HttpTransport,
        authorization: HeaderValue,
        item_url: &str,
    ) -> Result<&str, ConvertError> {
        if self.upload_url.is_none() {
            self.upload_url = Some(self.create(transport, authorization, item_url).await?);
        }
        Ok(self.upload_url.as_deref().unwrap_or_default())
    }

    /// Number of session-creation requests issued.
    pub fn creation_count(&self) -> usize {
        self.creations
    }

    pub fn is_open(&self) -> bool {
        self.upload_url.is_some()
    }

    async fn create(
        &mut self,
        transport: &dyn HttpTransport,
        authorization: HeaderValue,
        item_url: &str,
    ) -> Result<String, ConvertError> {
        info!("Creating upload session");
        self.creations += 1;

        let body = serde_json::to_vec(&CreateSessionBody {
            item: SessionItem {
                conflict_behavior: "replace",
            },
        })
        .map_err(|e| ConvertError::Internal(format!("session body encoding: {e}")))?;

        let request = HttpRequest::new(Method::POST, format!("{item_url}:/createUploadSession"))
            .header(header::AUTHORIZATION, authorization)
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body);

        let response = transport.send(request).await.map_err(|e| {
            error!("Upload session endpoint unreachable: {}", e);
            ConvertError::unreachable(OPERATION, e)
        })?;
        if !response.is_success() {
            error!("Upload session refused: {}", response.describe());
            return Err(ConvertError::unreachable(OPERATION, response.describe()));
        }

        let parsed: CreateSessionResponse =
            serde_json::from_slice(&response.body).map_err(|_| ConvertError::MalformedResponse {
                operation: OPERATION,
                field: "uploadUrl",
            })?;
        match parsed.upload_url {
            Some(url) if !url.is_empty() => {
                debug!(
                    "Upload session open (expires {})",
                    parsed.expiration_date_time.as_deref().unwrap_or("unknown")
                );
                Ok(url)
            }
            _ => {
                error!("Upload session response has no uploadUrl");
                Err(ConvertError::MalformedResponse {
                    operation: OPERATION,
                    field: "uploadUrl",
                })
            }
        }
    }
}
