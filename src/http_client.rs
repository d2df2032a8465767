use crate::error::TbxCheckError;
use futures::TryStreamExt;
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Settings for fetching schema files
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Retries after the first attempt
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Cap for the exponential backoff in milliseconds
    pub max_retry_delay_ms: u64,
    /// Largest body accepted, schema files are small
    pub max_body_bytes: u64,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            max_body_bytes: 16 * 1024 * 1024,
            user_agent: format!("tbx-check/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Delay before retry number `attempt` (0-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let delay_ms = self.retry_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_retry_delay_ms))
    }
}

/// Async HTTP client for downloading grammar and rule-set files
pub struct SchemaHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl SchemaHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, TbxCheckError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(TbxCheckError::from)?;

        Ok(Self { client, config })
    }

    /// Fetch the body at `url`, retrying timeouts, connection failures and 5xx answers
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, TbxCheckError> {
        let response = self.get_with_retry(url).await?;

        if response
            .content_length()
            .is_some_and(|length| length > self.config.max_body_bytes)
        {
            return Err(oversized(url, self.config.max_body_bytes));
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = TryStreamExt::try_next(&mut stream)
            .await
            .map_err(TbxCheckError::from)?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.config.max_body_bytes {
                return Err(oversized(url, self.config.max_body_bytes));
            }
        }

        tracing::debug!(url, bytes = body.len(), "fetched");
        Ok(body)
    }

    async fn get_with_retry(&self, url: &str) -> Result<Response, TbxCheckError> {
        let mut attempt = 0;

        loop {
            let error = match self.send(url).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    TbxCheckError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                        message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                    }
                }
                Err(error) => error,
            };

            if attempt >= self.config.retry_attempts || !is_retryable(&error) {
                return Err(error);
            }

            let delay = self.config.backoff_delay(attempt);
            tracing::warn!(url, attempt = attempt + 1, ?delay, "retrying after: {}", error);
            sleep(delay).await;
            attempt += 1;
        }
    }

    async fn send(&self, url: &str) -> Result<Response, TbxCheckError> {
        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            self.client.get(url).send(),
        )
        .await
        .map_err(|_| TbxCheckError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(TbxCheckError::from)
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

fn oversized(url: &str, limit: u64) -> TbxCheckError {
    TbxCheckError::HttpStatus {
        url: url.to_string(),
        status: 200,
        message: format!("response larger than {} bytes", limit),
    }
}

/// Server errors, timeouts and connection failures are worth another attempt
fn is_retryable(error: &TbxCheckError) -> bool {
    match error {
        TbxCheckError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
        TbxCheckError::Timeout { .. } => true,
        TbxCheckError::HttpStatus { status, .. } => (500..600).contains(status),
        _ => false,
    }
}
