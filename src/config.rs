//! Configuration types for drive-backed document conversion.
//!
//! Credentials, endpoints and transfer constants all live in
//! [`ConversionConfig`], built via [`ConversionConfigBuilder`]. The remote
//! handle receives the config by reference at construction time; nothing is
//! threaded through process-wide state.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use crate::transport::HttpTransport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Size of one resumable-upload chunk: 320 KiB.
///
/// The drive service requires every chunk except the last to be a multiple
/// of this value.
pub const CHUNK_SIZE: u64 = 327_680;

/// Largest document sent with a single PUT: 4 MiB.
pub const MAX_SMALL_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// Drive root used for item path addressing.
pub const DEFAULT_DRIVE_BASE_URL: &str = "https://graph.microsoft.com/v1.0/drive/root:";

/// Scope requested with the client-credentials grant.
///
/// The fully-qualified Graph form of `.default`; the bare `.default` is not
/// accepted by the v2.0 token endpoint. Override with
/// [`ConversionConfigBuilder::scope`].
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Build the token endpoint URL for a directory tenant.
pub fn auth_url_for_tenant(tenant: &str) -> String {
    format!(
        "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
        tenant.trim()
    )
}

/// Configuration for one or more conversions.
///
/// # Example
/// ```rust
/// use drive_convert::{ConversionConfig, TargetFormat};
///
/// let config = ConversionConfig::builder()
///     .client_id("00000000-0000-0000-0000-000000000000")
///     .client_secret("secret")
///     .tenant("contoso.onmicrosoft.com")
///     .target_format(TargetFormat::Pdf)
///     .build()
///     .unwrap();
/// assert!(config.auth_url.contains("contoso.onmicrosoft.com"));
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Application (client) identifier registered with the identity service.
    pub client_id: String,

    /// Client secret for the client-credentials grant.
    pub client_secret: String,

    /// Token endpoint. Usually derived from the tenant via [`auth_url_for_tenant`].
    pub auth_url: String,

    /// OAuth scope. Default: [`DEFAULT_SCOPE`].
    pub scope: String,

    /// Drive root that artifact names are appended to. Default: [`DEFAULT_DRIVE_BASE_URL`].
    pub drive_base_url: String,

    /// Extension given to the temporary remote artifact. Default: `docx`.
    ///
    /// The service picks its converter from this extension, so it must match
    /// the real type of the uploaded bytes.
    pub source_extension: String,

    /// Rendition requested from the service. Default: [`TargetFormat::Pdf`].
    pub target_format: TargetFormat,

    /// Documents larger than this go through an upload session. Default: 4 MiB.
    pub small_file_limit: u64,

    /// Bytes per upload-session chunk. Default: 320 KiB.
    pub chunk_size: u64,

    /// Per-request timeout applied by the default transport. Default: 300.
    pub request_timeout_secs: u64,

    /// Pre-constructed transport. Takes precedence over the built-in reqwest client.
    pub transport: Option<Arc<dyn HttpTransport>>,

    /// Optional upload/download progress receiver.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_url: String::new(),
            scope: DEFAULT_SCOPE.to_string(),
            drive_base_url: DEFAULT_DRIVE_BASE_URL.to_string(),
            source_extension: "docx".to_string(),
            target_format: TargetFormat::default(),
            small_file_limit: MAX_SMALL_FILE_SIZE,
            chunk_size: CHUNK_SIZE,
            request_timeout_secs: 300,
            transport: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("scope", &self.scope)
            .field("drive_base_url", &self.drive_base_url)
            .field("source_extension", &self.source_extension)
            .field("target_format", &self.target_format)
            .field("small_file_limit", &self.small_file_limit)
            .field("chunk_size", &self.chunk_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("transport", &self.transport.as_ref().map(|_| "<dyn HttpTransport>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn TransferProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Drive base URL without a trailing slash.
    pub(crate) fn base_url(&self) -> &str {
        self.drive_base_url.trim_end_matches('/')
    }

    /// Check the constraints `build()` enforces.
    ///
    /// The fields are public, so a config assembled with struct-update syntax
    /// is re-checked here before any request is made.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.client_id.trim().is_empty() {
            return Err(ConvertError::InvalidConfig("client_id is required".into()));
        }
        if self.client_secret.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "client_secret is required".into(),
            ));
        }
        if self.auth_url.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "auth_url (or tenant) is required".into(),
            ));
        }
        if self.drive_base_url.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "drive_base_url must not be empty".into(),
            ));
        }
        if self.source_extension.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "source_extension must not be empty".into(),
            ));
        }
        if self.chunk_size == 0 || self.chunk_size % CHUNK_SIZE != 0 {
            return Err(ConvertError::InvalidConfig(format!(
                "chunk_size must be a positive multiple of {} bytes, got {}",
                CHUNK_SIZE, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.config.client_id = id.into();
        self
    }

    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.client_secret = secret.into();
        self
    }

    /// Set the token endpoint from a tenant id or domain.
    pub fn tenant(mut self, tenant: impl AsRef<str>) -> Self {
        self.config.auth_url = auth_url_for_tenant(tenant.as_ref());
        self
    }

    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth_url = url.into();
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.config.scope = scope.into();
        self
    }

    pub fn drive_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.drive_base_url = url.into();
        self
    }

    pub fn source_extension(mut self, ext: impl AsRef<str>) -> Self {
        self.config.source_extension = ext.as_ref().trim_start_matches('.').to_lowercase();
        self
    }

    pub fn target_format(mut self, format: TargetFormat) -> Self {
        self.config.target_format = format;
        self
    }

    pub fn small_file_limit(mut self, bytes: u64) -> Self {
        self.config.small_file_limit = bytes;
        self
    }

    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        self.config.validate()?;
        Ok(self.config)
    }
}


// ── Enums ────────────────────────────────────────────────────────────────

/// Rendition formats the drive service can produce from an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// Portable Document Format. (default)
    #[default]
    Pdf,
    /// HTML rendition (supported for a subset of source types).
    Html,
    /// JPEG image of the first page.
    Jpg,
    /// Binary glTF, for 3D sources.
    Glb,
}

impl TargetFormat {
    /// Value of the `format` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Html => "html",
            TargetFormat::Jpg => "jpg",
            TargetFormat::Glb => "glb",
        }
    }

    /// MIME type sent as the accepted content type on download.
    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "application/pdf",
            TargetFormat::Html => "text/html",
            TargetFormat::Jpg => "image/jpeg",
            TargetFormat::Glb => "model/gltf-binary",
        }
    }

    /// File extension for the written output.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Ok(TargetFormat::Pdf),
            "html" | "htm" => Ok(TargetFormat::Html),
            "jpg" | "jpeg" => Ok(TargetFormat::Jpg),
            "glb" => Ok(TargetFormat::Glb),
            other => Err(ConvertError::InvalidConfig(format!(
                "unsupported target format '{other}' (expected pdf, html, jpg or glb)"
            ))),
        }
    }
}
