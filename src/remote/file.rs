//! The temporary remote artifact and the operations on it.
//!
//! A [`RemoteFile`] names one file in the drive (`{uuid}.{ext}`) and owns the
//! token cache and upload session used to reach it. It is single-use: upload
//! once, download one or more renditions, then [`RemoteFile::close`] to remove
//! the file. `close` must be awaited explicitly; `Drop` cannot perform network
//! I/O and only logs a warning when an uploaded artifact was never removed.

use crate::config::{ConversionConfig, TargetFormat};
use crate::error::ConvertError;
use crate::local::DocumentStream;
use crate::progress::ProgressCallback;
use crate::remote::session::{ByteRange, ChunkCursor, UploadSession};
use crate::remote::token::TokenCache;
use crate::remote::TransferMode;
use crate::transport::{HttpRequest, HttpTransport};
use bytes::Bytes;
use reqwest::header::{self, HeaderValue};
use reqwest::{Method, StatusCode};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Process-generated name of a remote artifact: `{uuid-v4}.{extension}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName(String);

impl ArtifactName {
    pub fn generate(extension: &str) -> Self {
        Self(format!(
            "{}.{}",
            Uuid::new_v4(),
            extension.trim_start_matches('.')
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoteState {
    /// Nothing has been sent that could create the item.
    Absent,
    /// An upload request was issued; the item may exist remotely.
    Created,
    /// The item was deleted (or confirmed missing).
    Deleted,
}

/// One temporary file in the remote drive.
pub struct RemoteFile {
    name: ArtifactName,
    item_url: String,
    small_file_limit: u64,
    chunk_size: u64,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenCache,
    session: UploadSession,
    progress: Option<ProgressCallback>,
    state: RemoteState,
    closed: bool,
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("name", &self.name)
            .field("item_url", &self.item_url)
            .field("state", &self.state)
            .field("tokens", &self.tokens)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl RemoteFile {
    /// New handle whose artifact uses `config.source_extension`.
    pub fn new(config: &ConversionConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_extension(config, transport, &config.source_extension)
    }

    /// New handle whose artifact uses `extension`.
    pub fn with_extension(
        config: &ConversionConfig,
        transport: Arc<dyn HttpTransport>,
        extension: &str,
    ) -> Self {
        let name = ArtifactName::generate(extension);
        let item_url = format!("{}/{}", config.base_url(), name);
        debug!("Remote artifact: {}", item_url);
        Self {
            name,
            item_url,
            small_file_limit: config.small_file_limit,
            chunk_size: config.chunk_size,
            transport,
            tokens: TokenCache::new(config),
            session: UploadSession::new(),
            progress: config.progress_callback.clone(),
            state: RemoteState::Absent,
            closed: false,
        }
    }

    pub fn name(&self) -> &ArtifactName {
        &self.name
    }

    /// Path-addressed URL of the artifact, `{base}/{name}`.
    pub fn item_url(&self) -> &str {
        &self.item_url
    }

    /// True once an upload request has been issued and not yet deleted.
    pub fn is_created(&self) -> bool {
        self.state == RemoteState::Created
    }

    /// Number of token requests issued by this handle (0 or 1 on success).
    pub fn token_fetches(&self) -> usize {
        self.tokens.fetch_count()
    }

    /// Number of upload sessions created by this handle.
    pub fn session_creations(&self) -> usize {
        self.session.creation_count()
    }

    /// Upload the document, choosing the transfer mode from its size.
    pub async fn upload(&mut self, input: &mut DocumentStream) -> Result<TransferMode, ConvertError> {
        let mode = TransferMode::select(input.len(), input.size_hint(), self.small_file_limit);
        info!(
            "Uploading {} ({} bytes, {} mode)",
            self.name,
            input.len(),
            mode
        );
        if let Some(cb) = &self.progress {
            cb.on_upload_start(self.name.as_str(), input.len(), mode);
        }

        match mode {
            TransferMode::Simple => self.simple_upload(input).await?,
            TransferMode::Chunked => self.chunked_upload(input).await?,
        }

        info!("File {} uploaded", self.name);
        if let Some(cb) = &self.progress {
            cb.on_upload_complete(input.len());
        }
        Ok(mode)
    }

    /// Upload through a resumable session, one PUT per [`ByteRange`].
    pub async fn chunked_upload(&mut self, input: &mut DocumentStream) -> Result<(), ConvertError> {
        let total = input.len();
        if total == 0 {
            // A session cannot carry zero bytes.
            warn!("Empty document cannot use an upload session; sending it whole");
            return self.simple_upload(input).await;
        }

        if self.chunk_size == 0 {
            return Err(ConvertError::InvalidConfig(
                "chunk_size must be positive".into(),
            ));
        }

        let authorization = self.tokens.authorization(self.transport.as_ref()).await?;
        let upload_url = self
            .session
            .upload_url(self.transport.as_ref(), authorization.clone(), &self.item_url)
            .await?
            .to_string();

        let cursor = ChunkCursor::new(total, self.chunk_size);
        let chunks = cursor.chunk_count();
        info!("Sending {} in {} chunks", self.name, chunks);

        for (i, range) in cursor.enumerate() {
            let bytes = input.read_chunk(range.len() as usize).await?;
            debug!("{}/{} Content-Range {}", i + 1, chunks, range);
            self.put_chunk(&upload_url, &authorization, range, bytes)
                .await?;
            if let Some(cb) = &self.progress {
                cb.on_chunk_sent(i + 1, chunks, &range);
            }
        }
        Ok(())
    }

    /// Request a converted rendition of the uploaded file.
    pub async fn download(&mut self, format: TargetFormat) -> Result<Bytes, ConvertError> {
        const OPERATION: &str = "download";
        info!("Requesting {} rendition of {}", format, self.name);

        let authorization = self.tokens.authorization(self.transport.as_ref()).await?;
        let mime = HeaderValue::from_static(format.mime_type());
        let request = HttpRequest::new(
            Method::GET,
            format!("{}:/content?format={}", self.item_url, format.as_str()),
        )
        .header(header::AUTHORIZATION, authorization)
        .header(header::ACCEPT, mime.clone())
        .header(header::CONTENT_TYPE, mime);

        let response = self.transport.send(request).await.map_err(|e| {
            error!("Download failed: {}", e);
            ConvertError::unreachable(OPERATION, e)
        })?;
        if !response.is_success() {
            error!("Download refused: {}", response.describe());
            return Err(ConvertError::unreachable(OPERATION, response.describe()));
        }

        info!("Received {} bytes of {}", response.body.len(), format);
        if let Some(cb) = &self.progress {
            cb.on_download_complete(format.as_str(), response.body.len() as u64);
        }
        Ok(response.body)
    }

    /// Delete the artifact. A 404 counts as success.
    pub async fn delete(&mut self) -> Result<(), ConvertError> {
        const OPERATION: &str = "delete";
        info!("Deleting remote file {}", self.name);

        let authorization = self.tokens.authorization(self.transport.as_ref()).await?;
        let request = HttpRequest::new(Method::DELETE, self.item_url.clone())
            .header(header::AUTHORIZATION, authorization);

        let response = self.transport.send(request).await.map_err(|e| {
            error!("Delete failed: {}", e);
            ConvertError::unreachable(OPERATION, e)
        })?;
        if !(response.is_success() || response.status == StatusCode::NOT_FOUND) {
            error!("Delete refused: {}", response.describe());
            return Err(ConvertError::unreachable(OPERATION, response.describe()));
        }

        self.state = RemoteState::Deleted;
        info!("Remote file {} deleted", self.name);
        if let Some(cb) = &self.progress {
            cb.on_remote_deleted(self.name.as_str());
        }
        Ok(())
    }

    /// Release the handle, deleting the artifact if an upload reached the service.
    pub async fn close(mut self) -> Result<(), ConvertError> {
        self.closed = true;
        if self.state == RemoteState::Created {
            self.delete().await
        } else {
            debug!("Nothing to delete for {}", self.name);
            Ok(())
        }
    }

    async fn simple_upload(&mut self, input: &mut DocumentStream) -> Result<(), ConvertError> {
        let authorization = self.tokens.authorization(self.transport.as_ref()).await?;
        let body = input.read_to_end().await?;
        let len = body.len();

        let request = HttpRequest::new(Method::PUT, format!("{}:/content", self.item_url))
            .header(header::AUTHORIZATION, authorization)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            )
            .body(body);

        self.state = RemoteState::Created;
        let response = self.transport.send(request).await.map_err(|e| {
            error!("Upload of {} failed: {}", self.name, e);
            ConvertError::transfer(format!("PUT of {len} bytes failed: {e}"))
        })?;
        match response.status {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            _ => {
                error!("Upload of {} refused: {}", self.name, response.describe());
                Err(ConvertError::transfer(format!(
                    "PUT of {len} bytes rejected with {}",
                    response.describe()
                )))
            }
        }
    }

    async fn put_chunk(
        &mut self,
        upload_url: &str,
        authorization: &HeaderValue,
        range: ByteRange,
        bytes: Bytes,
    ) -> Result<(), ConvertError> {
        let content_range = HeaderValue::from_str(&range.content_range())
            .map_err(|e| ConvertError::Internal(format!("Content-Range header: {e}")))?;
        let request = HttpRequest::new(Method::PUT, upload_url)
            .header(header::AUTHORIZATION, authorization.clone())
            .header(header::CONTENT_LENGTH, HeaderValue::from(range.len()))
            .header(header::CONTENT_RANGE, content_range)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("multipart/form-data"),
            )
            .body(bytes);

        self.state = RemoteState::Created;
        let response = self.transport.send(request).await.map_err(|e| {
            error!("Chunk {} failed: {}", range, e);
            ConvertError::transfer(format!("chunk {range} failed: {e}"))
        })?;
        match response.status {
            StatusCode::ACCEPTED | StatusCode::OK | StatusCode::CREATED => Ok(()),
            _ => {
                error!("Chunk {} refused: {}", range, response.describe());
                Err(ConvertError::transfer(format!(
                    "chunk {range} rejected with {}",
                    response.describe()
                )))
            }
        }
    }
}

impl Drop for RemoteFile {
    fn drop(&mut self) {
        if !self.closed && self.state == RemoteState::Created {
            warn!(
                "Remote file {} dropped without close(); it was not deleted",
                self.item_url
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CHUNK_SIZE, MAX_SMALL_FILE_SIZE};
    use crate::transport::mock::{self, MockTransport};
    use crate::transport::{HttpResponse, TransportError};

    fn handle(transport: &Arc<MockTransport>) -> RemoteFile {
        let config = mock::config(transport.clone());
        RemoteFile::new(&config, transport.clone())
    }

    fn doc_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn doc(len: usize) -> DocumentStream {
        DocumentStream::from_bytes(doc_bytes(len))
    }

    #[test]
    fn artifact_name_is_uuid_plus_extension() {
        let name = ArtifactName::generate(".docx");
        let (stem, ext) = name.as_str().rsplit_once('.').unwrap();
        assert_eq!(ext, "docx");
        assert!(Uuid::parse_str(stem).is_ok());
        assert_ne!(name, ArtifactName::generate("docx"));
    }

    #[tokio::test]
    async fn small_document_is_one_put() {
        let transport = MockTransport::happy();
        let mut file = handle(&transport);
        let mut input = doc(1000);

        let mode = file.upload(&mut input).await.unwrap();

        assert_eq!(mode, TransferMode::Simple);
        let reqs = transport.requests();
        assert_eq!(reqs.len(), 2, "token + PUT");
        assert_eq!(reqs[1].method, Method::PUT);
        assert_eq!(reqs[1].url, format!("{}:/content", file.item_url()));
        assert_eq!(reqs[1].body.len(), 1000);
        assert_eq!(reqs[1].header_str("authorization"), Some("Bearer tok-1"));
        assert_eq!(file.session_creations(), 0);
        assert!(file.is_created());
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn document_at_limit_is_simple() {
        let transport = MockTransport::happy();
        let mut file = handle(&transport);
        let mut input = doc(MAX_SMALL_FILE_SIZE as usize);
        assert_eq!(file.upload(&mut input).await.unwrap(), TransferMode::Simple);
        assert_eq!(transport.count(Method::PUT), 1);
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_document_is_empty_put() {
        let transport = MockTransport::happy();
        let mut file = handle(&transport);
        let mut input = doc(0);
        assert_eq!(file.upload(&mut input).await.unwrap(), TransferMode::Simple);
        let put = transport
            .requests()
            .into_iter()
            .find(|r| r.method == Method::PUT)
            .unwrap();
        assert!(put.body.is_empty());
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn large_document_goes_through_session() {
        let transport = MockTransport::happy();
        let mut file = handle(&transport);
        let len = MAX_SMALL_FILE_SIZE as usize + 5;
        let mut input = doc(len);

        assert_eq!(file.upload(&mut input).await.unwrap(), TransferMode::Chunked);

        let chunks: Vec<_> = transport
            .requests()
            .into_iter()
            .filter(|r| r.url == mock::UPLOAD_URL)
            .collect();
        assert_eq!(chunks.len(), (len as u64).div_ceil(CHUNK_SIZE) as usize);
        assert_eq!(file.session_creations(), 1);
        assert_eq!(file.token_fetches(), 1);

        let mut next = 0u64;
        let mut reassembled = Vec::with_capacity(len);
        for c in &chunks {
            assert_eq!(c.method, Method::PUT);
            assert_eq!(c.header_str("content-type"), Some("multipart/form-data"));
            let range = c.header_str("content-range").unwrap();
            let expected_end = (next + CHUNK_SIZE).min(len as u64) - 1;
            assert_eq!(range, format!("bytes {next}-{expected_end}/{len}"));
            assert_eq!(
                c.header_str("content-length").unwrap(),
                (expected_end - next + 1).to_string()
            );
            assert_eq!(c.body.len() as u64, expected_end - next + 1);
            reassembled.extend_from_slice(&c.body);
            next = expected_end + 1;
        }
        assert_eq!(next, len as u64);
        assert_eq!(reassembled, doc_bytes(len));
        assert_eq!(chunks.last().unwrap().body.len() as u64, len as u64 % CHUNK_SIZE);
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_document_with_large_hint_is_one_empty_put() {
        let transport = MockTransport::happy();
        let mut file = handle(&transport);
        let mut input = doc(0).with_size_hint(MAX_SMALL_FILE_SIZE + 1);

        assert_eq!(file.upload(&mut input).await.unwrap(), TransferMode::Simple);
        assert_eq!(file.session_creations(), 0);
        let puts: Vec<_> = transport
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::PUT)
            .collect();
        assert_eq!(puts.len(), 1);
        assert!(puts[0].body.is_empty());
        assert!(puts[0].url.ends_with(":/content"));
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn zero_chunk_size_is_rejected_without_requests() {
        let transport = MockTransport::happy();
        let config = ConversionConfig {
            chunk_size: 0,
            ..mock::config(transport.clone())
        };
        let mut file = RemoteFile::new(&config, transport.clone());
        let mut input = doc(MAX_SMALL_FILE_SIZE as usize + 1);

        let err = file.upload(&mut input).await.unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
        assert!(transport.requests().is_empty());
        assert!(!file.is_created());
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn size_hint_forces_session_for_short_stream() {
        let transport = MockTransport::happy();
        let mut file = handle(&transport);
        let mut input = doc(10).with_size_hint(MAX_SMALL_FILE_SIZE + 1);
        assert_eq!(file.upload(&mut input).await.unwrap(), TransferMode::Chunked);
        let chunk = transport
            .requests()
            .into_iter()
            .find(|r| r.url == mock::UPLOAD_URL)
            .unwrap();
        assert_eq!(chunk.header_str("content-range"), Some("bytes 0-9/10"));
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn rejected_chunk_fails_the_upload() {
        let transport = MockTransport::new(|req| {
            if req.url == mock::UPLOAD_URL
                && req.header_str("content-range").is_some_and(|r| !r.starts_with("bytes 0-"))
            {
                return Ok(HttpResponse::new(
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    Bytes::new(),
                ));
            }
            mock::happy_response(req)
        });
        let mut file = handle(&transport);
        let mut input = doc(MAX_SMALL_FILE_SIZE as usize + 1);

        let err = file.upload(&mut input).await.unwrap_err();
        assert!(matches!(err, ConvertError::TransferFailed { .. }), "got {err:?}");
        assert_eq!(
            transport
                .requests()
                .iter()
                .filter(|r| r.url == mock::UPLOAD_URL)
                .count(),
            2,
            "stops at the first rejected chunk"
        );
        assert!(file.is_created());
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn transport_error_on_simple_put_is_transfer_failed() {
        let transport = MockTransport::new(|req| {
            if req.method == Method::PUT {
                return Err(TransportError::new("reset by peer"));
            }
            mock::happy_response(req)
        });
        let mut file = handle(&transport);
        let err = file.upload(&mut doc(10)).await.unwrap_err();
        assert!(matches!(err, ConvertError::TransferFailed { .. }));
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn download_requests_format_with_headers() {
        let transport = MockTransport::happy();
        let mut file = handle(&transport);
        file.upload(&mut doc(3)).await.unwrap();

        let bytes = file.download(TargetFormat::Pdf).await.unwrap();
        assert_eq!(bytes.as_ref(), mock::CONVERTED);

        let get = transport
            .requests()
            .into_iter()
            .find(|r| r.method == Method::GET)
            .unwrap();
        assert_eq!(get.url, format!("{}:/content?format=pdf", file.item_url()));
        assert_eq!(get.header_str("accept"), Some("application/pdf"));
        assert_eq!(get.header_str("content-type"), Some("application/pdf"));
        assert_eq!(get.header_str("authorization"), Some("Bearer tok-1"));
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn download_failure_is_unreachable() {
        let transport = MockTransport::new(|req| {
            if req.method == Method::GET {
                return Ok(HttpResponse::new(StatusCode::NOT_ACCEPTABLE, Bytes::new()));
            }
            mock::happy_response(req)
        });
        let mut file = handle(&transport);
        file.upload(&mut doc(3)).await.unwrap();
        let err = file.download(TargetFormat::Html).await.unwrap_err();
        assert!(matches!(err, ConvertError::ServiceUnreachable { operation: "download", .. }));
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn token_fetched_once_across_all_operations() {
        let transport = MockTransport::happy();
        let mut file = handle(&transport);
        file.upload(&mut doc(MAX_SMALL_FILE_SIZE as usize * 2)).await.unwrap();
        file.download(TargetFormat::Pdf).await.unwrap();
        file.download(TargetFormat::Jpg).await.unwrap();
        assert_eq!(file.token_fetches(), 1);
        file.close().await.unwrap();
        assert_eq!(transport.auth_calls(), 1);
    }

    #[tokio::test]
    async fn close_deletes_uploaded_artifact() {
        let transport = MockTransport::happy();
        let mut file = handle(&transport);
        file.upload(&mut doc(3)).await.unwrap();
        let item = file.item_url().to_string();

        file.close().await.unwrap();

        let last = transport.requests().pop().unwrap();
        assert_eq!(last.method, Method::DELETE);
        assert_eq!(last.url, item);
        assert_eq!(last.header_str("authorization"), Some("Bearer tok-1"));
    }

    #[tokio::test]
    async fn close_without_upload_sends_nothing() {
        let transport = MockTransport::happy();
        let file = handle(&transport);
        file.close().await.unwrap();
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn delete_accepts_not_found() {
        let transport = MockTransport::new(|req| {
            if req.method == Method::DELETE {
                return Ok(HttpResponse::new(StatusCode::NOT_FOUND, Bytes::new()));
            }
            mock::happy_response(req)
        });
        let mut file = handle(&transport);
        file.upload(&mut doc(3)).await.unwrap();
        file.delete().await.unwrap();
        assert!(!file.is_created());
        file.close().await.unwrap();
        assert_eq!(transport.count(Method::DELETE), 1);
    }

    #[tokio::test]
    async fn delete_refused_is_unreachable() {
        let transport = MockTransport::new(|req| {
            if req.method == Method::DELETE {
                return Ok(HttpResponse::new(StatusCode::FORBIDDEN, Bytes::new()));
            }
            mock::happy_response(req)
        });
        let mut file = handle(&transport);
        file.upload(&mut doc(3)).await.unwrap();
        let err = file.close().await.unwrap_err();
        assert!(matches!(err, ConvertError::ServiceUnreachable { operation: "delete", .. }));
    }
}
