use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::domain::{DomainError, ProviderError, ProviderErrorKind};

/// Provider name used until an adapter re-attributes the error
const TRANSPORT: &str = "http";

/// Longest error body excerpt carried into a `ProviderError`
const MAX_ERROR_BODY: usize = 512;

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Client with a connect timeout; per-call budgets are enforced by the caller
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a non-success HTTP status
pub fn kind_for_status(status: StatusCode) -> ProviderErrorKind {
    match status.as_u16() {
        401 | 403 => ProviderErrorKind::Authentication,
        408 | 504 => ProviderErrorKind::Timeout,
        429 => ProviderErrorKind::RateLimited,
        400 | 404 | 413 | 422 => ProviderErrorKind::InvalidRequest,
        s if s >= 500 => ProviderErrorKind::Unavailable,
        _ => ProviderErrorKind::InvalidRequest,
    }
}

fn kind_for_transport(error: &reqwest::Error) -> ProviderErrorKind {
    if error.is_timeout() {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::Unavailable
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.json(body).send().await.map_err(|e| {
            ProviderError::new(TRANSPORT, kind_for_transport(&e), format!("Request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                TRANSPORT,
                kind_for_status(status),
                format!("HTTP {}: {}", status, excerpt(&error_body)),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(TRANSPORT, format!("Failed to parse response: {}", e)))
    }
}
