//! Local I/O: open source documents and write converted results.
//!
//! A [`DocumentStream`] pairs an async reader with its exact length. The
//! length decides the transfer mode and feeds the `Content-Range` totals, so
//! it must be known before the first byte is sent. Chunks are pulled from the
//! reader on demand; a large file is never held in memory all at once.

use crate::config::TargetFormat;
use crate::error::ConvertError;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

/// A source document: reader, exact length, optional caller size hint.
pub struct DocumentStream {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    len: u64,
    size_hint: u64,
    extension: Option<String>,
}

impl fmt::Debug for DocumentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStream")
            .field("len", &self.len)
            .field("size_hint", &self.size_hint)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl DocumentStream {
    /// Wrap an in-memory document.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes: Bytes = bytes.into();
        let len = bytes.len() as u64;
        Self::from_reader(Cursor::new(bytes), len)
    }

    /// Wrap any async reader that will yield exactly `len` bytes.
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static, len: u64) -> Self {
        Self {
            reader: Box::new(reader),
            len,
            size_hint: 0,
            extension: None,
        }
    }

    /// Caller-declared size. A hint above the small-file limit forces a
    /// session upload even when the stream itself is short.
    pub fn with_size_hint(mut self, size_hint: u64) -> Self {
        self.size_hint = size_hint;
        self
    }

    /// Extension of the original file, used to name the remote artifact.
    pub fn with_extension(mut self, ext: impl AsRef<str>) -> Self {
        let ext = ext.as_ref().trim_start_matches('.').to_lowercase();
        self.extension = (!ext.is_empty()).then_some(ext);
        self
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size_hint(&self) -> u64 {
        self.size_hint
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Read exactly `n` bytes.
    pub async fn read_chunk(&mut self, n: usize) -> Result<Bytes, ConvertError> {
        let mut buf = BytesMut::zeroed(n);
        self.reader
            .read_exact(&mut buf)
            .await
            .map_err(|source| ConvertError::SourceRead { source })?;
        Ok(buf.freeze())
    }

    /// Read the whole remaining document.
    pub async fn read_to_end(&mut self) -> Result<Bytes, ConvertError> {
        let mut buf = Vec::with_capacity(self.len as usize);
        self.reader
            .read_to_end(&mut buf)
            .await
            .map_err(|source| ConvertError::SourceRead { source })?;
        if buf.len() as u64 != self.len {
            return Err(ConvertError::SourceRead {
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("expected {} bytes, read {}", self.len, buf.len()),
                ),
            });
        }
        Ok(Bytes::from(buf))
    }
}

/// Open a local file as a [`DocumentStream`].
///
/// Fails before any network activity when the file is missing or unreadable.
pub async fn open_source(path: impl AsRef<Path>) -> Result<DocumentStream, ConvertError> {
    let path = path.as_ref();
    info!("Opening source document: {}", path.display());

    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Source document not found: {}", path.display());
            return Err(ConvertError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(source) => return Err(ConvertError::SourceRead { source }),
    };

    let meta = file
        .metadata()
        .await
        .map_err(|source| ConvertError::SourceRead { source })?;
    if !meta.is_file() {
        return Err(ConvertError::NotFound {
            path: path.to_path_buf(),
        });
    }

    debug!("Source is {} bytes", meta.len());
    let mut stream = DocumentStream::from_reader(file, meta.len());
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        stream = stream.with_extension(ext);
    }
    Ok(stream)
}

/// Output path for a converted document: same location, extension replaced
/// by the target format's (appended when the input has none).
pub fn output_path_for(input: impl AsRef<Path>, format: TargetFormat) -> PathBuf {
    input.as_ref().with_extension(format.extension())
}

/// Write `bytes` to `path` atomically (temp file in the same directory, then rename).
pub fn write_output(path: impl AsRef<Path>, bytes: &[u8]) -> Result<PathBuf, ConvertError> {
    let path = path.as_ref();
    let fail = |source: std::io::Error| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(fail)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.flush().map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;

    info!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_missing_file_is_not_found() {
        let err = open_source("/definitely/not/here.docx").await.unwrap_err();
        assert!(matches!(err, ConvertError::NotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn open_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_source(dir.path()).await.unwrap_err();
        assert!(matches!(err, ConvertError::NotFound { .. }));
    }

    #[tokio::test]
    async fn open_reads_length_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Report.DOCX");
        std::fs::write(&path, b"hello world").unwrap();

        let mut stream = open_source(&path).await.unwrap();
        assert_eq!(stream.len(), 11);
        assert_eq!(stream.extension(), Some("docx"));
        assert_eq!(stream.read_to_end().await.unwrap().as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn read_chunk_walks_the_stream() {
        let mut stream = DocumentStream::from_bytes(&b"abcdefgh"[..]);
        assert_eq!(stream.read_chunk(3).await.unwrap().as_ref(), b"abc");
        assert_eq!(stream.read_chunk(5).await.unwrap().as_ref(), b"defgh");
        let err = stream.read_chunk(1).await.unwrap_err();
        assert!(matches!(err, ConvertError::SourceRead { .. }));
    }

    #[tokio::test]
    async fn read_to_end_detects_short_stream() {
        let mut stream = DocumentStream::from_reader(Cursor::new(vec![1u8, 2, 3]), 10);
        let err = stream.read_to_end().await.unwrap_err();
        assert!(matches!(err, ConvertError::SourceRead { .. }));
    }

    #[test]
    fn size_hint_and_extension_builders() {
        let stream = DocumentStream::from_bytes(Bytes::new())
            .with_size_hint(42)
            .with_extension(".Xlsx");
        assert!(stream.is_empty());
        assert_eq!(stream.size_hint(), 42);
        assert_eq!(stream.extension(), Some("xlsx"));

        let stream = DocumentStream::from_bytes(Bytes::new()).with_extension("");
        assert_eq!(stream.extension(), None);
    }

    #[test]
    fn output_path_replaces_extension() {
        assert_eq!(
            output_path_for("/data/in/report.docx", TargetFormat::Pdf),
            PathBuf::from("/data/in/report.pdf")
        );
        assert_eq!(
            output_path_for("notes.v2.docx", TargetFormat::Html),
            PathBuf::from("notes.v2.html")
        );
        assert_eq!(
            output_path_for("README", TargetFormat::Pdf),
            PathBuf::from("README.pdf")
        );
    }

    #[test]
    fn write_output_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/report.pdf");

        write_output(&path, b"first").unwrap();
        write_output(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1, "temp file must be renamed away");
    }
}
