//! Client-credentials token, fetched lazily and kept for the handle's lifetime.
//!
//! The token is never refreshed: a conversion that outlives the token's
//! validity will start receiving 401s from the service. Callers converting
//! very large files on slow links should keep that in mind.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::transport::{HttpRequest, HttpTransport};
use reqwest::header::{self, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, error, info};

const OPERATION: &str = "token request";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Lazily-fetched bearer token and the `Authorization` header derived from it.
pub struct TokenCache {
    auth_url: String,
    form: Vec<(&'static str, String)>,
    token: Option<String>,
    authorization: Option<HeaderValue>,
    fetches: usize,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("auth_url", &self.auth_url)
            .field("cached", &self.token.is_some())
            .field("fetches", &self.fetches)
            .finish()
    }
}

impl TokenCache {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            auth_url: config.auth_url.clone(),
            form: vec![
                ("client_id", config.client_id.clone()),
                ("scope", config.scope.clone()),
                ("grant_type", "client_credentials".to_string()),
                ("client_secret", config.client_secret.clone()),
            ],
            token: None,
            authorization: None,
            fetches: 0,
        }
    }

    /// The bearer token, requesting it on first use.
    pub async fn token(&mut self, transport: &dyn HttpTransport) -> Result<&str, ConvertError> {
        if self.token.is_none() {
            self.token = Some(self.fetch(transport).await?);
        }
        Ok(self.token.as_deref().unwrap_or_default())
    }

    /// `Authorization: Bearer …` value. Computed once; later calls reuse it.
    pub async fn authorization(
        &mut self,
        transport: &dyn HttpTransport,
    ) -> Result<HeaderValue, ConvertError> {
        if let Some(value) = &self.authorization {
            return Ok(value.clone());
        }
        let token = self.token(transport).await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ConvertError::MalformedResponse {
                operation: OPERATION,
                field: "access_token",
            }
        })?;
        value.set_sensitive(true);
        self.authorization = Some(value.clone());
        Ok(value)
    }

    /// Number of times the token endpoint has been called.
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    async fn fetch(&mut self, transport: &dyn HttpTransport) -> Result<String, ConvertError> {
        info!("Requesting access token");
        self.fetches += 1;

        let body = serde_urlencoded::to_string(&self.form)
            .map_err(|e| ConvertError::Internal(format!("token form encoding: {e}")))?;
        let request = HttpRequest::new(Method::POST, &self.auth_url)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(body);

        let response = transport.send(request).await.map_err(|e| {
            error!("Token endpoint unreachable: {}", e);
            ConvertError::unreachable(OPERATION, e)
        })?;
        if !response.is_success() {
            error!("Token endpoint refused the request: {}", response.describe());
            return Err(ConvertError::unreachable(OPERATION, response.describe()));
        }

        let parsed: TokenResponse = serde_json::from_slice(&response.body).map_err(|e| {
            debug!("Token response is not JSON: {}", e);
            ConvertError::MalformedResponse {
                operation: OPERATION,
                field: "access_token",
            }
        })?;
        match parsed.access_token {
            Some(token) if !token.is_empty() => {
                info!("Access token received");
                Ok(token)
            }
            _ => {
                error!("Token response has no access_token");
                Err(ConvertError::MalformedResponse {
                    operation: OPERATION,
                    field: "access_token",
                })
            }
        }
    }
}
