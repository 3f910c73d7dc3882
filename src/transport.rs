//! HTTP transport seam.
//!
//! The remote handle never touches reqwest directly. It builds an
//! [`HttpRequest`], hands it to an [`HttpTransport`], and interprets the
//! [`HttpResponse`]. Production code uses [`ReqwestTransport`]; tests plug in
//! a recording fake via [`crate::ConversionConfig::transport`].
//!
//! A transport only reports *transport* failures (connection refused, DNS,
//! timeout). Any HTTP status, including 4xx/5xx, comes back as a response so
//! the caller can map it to the right [`crate::ConvertError`] category.

use crate::error::ConvertError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// One outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Header value as a string, if present and visible ASCII.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A complete response: status plus fully-read body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Short description for error messages: status plus the start of the body.
    pub(crate) fn describe(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let text = text.trim();
        if text.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            let snippet: String = text.chars().take(200).collect();
            format!("HTTP {}: {}", self.status, snippet)
        }
    }
}

/// The request never produced a response.
#[derive(Debug, Clone, Error)]
#[error("{message}{}", timeout_note(.timed_out))]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

fn timeout_note(timed_out: &bool) -> &'static str {
    if *timed_out {
        " (request timed out)"
    } else {
        ""
    }
}

/// Sends requests to the remote service.
///
/// Implementations must be `Send + Sync` so a single transport can be shared
/// through [`crate::ConversionConfig`] by independent conversions.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client whose requests time out after `timeout_secs`.
    pub fn new(timeout_secs: u64) -> Result<Self, ConvertError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConvertError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!("{} {}", request.method, request.url);

        let response = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportError {
                message: e.to_string(),
                timed_out: e.is_timeout(),
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| TransportError {
            message: format!("failed to read response body: {e}"),
            timed_out: e.is_timeout(),
        })?;

        debug!("→ {} ({} bytes)", status, body.len());
        Ok(HttpResponse { status, body })
    }
}
