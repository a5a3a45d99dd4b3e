//! HTTP client utilities.

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::from_config(&HttpConfig::default())
    }

    /// Create a client honouring the configured timeout and user agent
    pub fn from_config(config: &HttpConfig) -> Result<Self, SourceError> {
        let user_agent = config.user_agent.clone().unwrap_or_else(|| {
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
        });

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// GET `url` with `params` and return the body of a successful response
    ///
    /// Non-2xx statuses become [`SourceError::Upstream`] carrying the status
    /// code and the response body verbatim. Transport failures and timeouts
    /// become `Upstream` without a status.
    pub async fn get_text(&self, url: &str, params: &[(String, String)]) -> Result<String, SourceError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| SourceError::upstream(None, format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            SourceError::upstream(
                Some(status.as_u16()),
                format!("Failed to read response from {}: {}", url, e),
            )
        })?;

        if !status.is_success() {
            tracing::debug!(url, status = status.as_u16(), "upstream returned error status");
            return Err(SourceError::upstream(Some(status.as_u16()), body));
        }

        Ok(body)
    }
}
