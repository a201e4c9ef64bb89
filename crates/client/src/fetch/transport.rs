//! The authenticated transport collaborator.
//!
//! The helper only distinguishes a transport that fails (no HTTP status at all)
//! from one that returns a response with any status.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use revrest_core::{AppConfig, Error};
use std::time::Duration;

use super::response::RestResponse;

/// A request ready to go on the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Final URL including base path and query string
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Telemetry-safe URL; used for logging only, never sent
    pub anonymized_url: Option<String>,
}

/// Failure of the transport itself.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Sends requests to the server, supplying authentication.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: TransportRequest) -> Result<RestResponse, TransportError>;
}

/// Configuration for the reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// User agent string (default: "revrest/0.1")
    pub user_agent: String,
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self { user_agent: "revrest/0.1".to_string(), timeout: Duration::from_millis(30_000), auth_token: None }
    }
}

impl From<&AppConfig> for HttpTransportConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), auth_token: config.auth_token.clone() }
    }
}

/// Transport backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, Error> {
        let mut default_headers = HeaderMap::new();
        if let Some(token) = &config.auth_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::InvalidInput(format!("invalid auth token: {e}")))?;
            value.set_sensitive(true);
            default_headers.insert(header::AUTHORIZATION, value);
        }

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .default_headers(default_headers)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: TransportRequest) -> Result<RestResponse, TransportError> {
        let mut builder = self.http.request(request.method, &request.url).headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(RestResponse { url: request.url, status, headers, body })
    }
}
