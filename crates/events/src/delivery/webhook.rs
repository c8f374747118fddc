//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] posts a markdown message to a chat-robot style
//! webhook. Failed attempts are retried with exponential backoff
//! (1 s, 2 s, 4 s by default).

use std::time::Duration;

use serde_json::json;

/// Default retry delays (exponential backoff: 1s, 2s, 4s).
const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers markdown messages to external webhook endpoints.
pub struct WebhookDelivery {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl WebhookDelivery {
    /// Create a delivery service with a pre-configured HTTP client.
    pub fn new() -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
        })
    }

    /// Replace the backoff schedule. An empty schedule means a single attempt.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Build the robot payload for a markdown message.
    pub fn payload(content: &str) -> serde_json::Value {
        json!({
            "msgtype": "markdown",
            "markdown": { "content": content },
        })
    }

    /// Deliver `content` to `url`, retrying on failure.
    ///
    /// Returns `Ok(())` on the first successful attempt.
    pub async fn deliver(&self, url: &str, content: &str) -> Result<(), WebhookError> {
        let payload = Self::payload(content);

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(url, &payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        self.try_send(url, &payload).await.inspect_err(|e| {
            tracing::error!(url, error = %e, "Webhook delivery failed after all retries");
        })
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, url: &str, payload: &serde_json::Value) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        tracing::debug!(url, status = status.as_u16(), "Webhook responded");
        if !status.is_success() {
            return Err(WebhookError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
