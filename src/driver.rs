use std::time::Duration;

use reqwest::Client;
use tokio::time::Instant;

use crate::metric::{FailureReason, Outcome};

/// Issues single timed GET requests against one target.
///
/// The driver is cheap to clone: the underlying [`Client`] and its connection
/// pool are shared by every virtual user.
#[derive(Debug, Clone)]
pub struct RequestDriver {
    client: Client,
    url: String,
    timeout: Duration,
}

impl RequestDriver {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    /// Build a driver with its own client.
    pub fn connect(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self::new(client, url, timeout))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Perform exactly one GET and classify it. Never fails.
    ///
    /// The latency covers the whole exchange up to the last byte of the body.
    /// When the timeout fires the request future is dropped, which aborts the
    /// connection.
    pub async fn send(&self) -> Outcome {
        let start = Instant::now();
        let exchange = async {
            let response = self.client.get(&self.url).send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body.len()))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok((status, bytes))) => {
                let latency = start.elapsed().as_secs_f64() * 1000.0;
                tracing::trace!(%status, bytes, latency, "request completed");
                Outcome::Success(latency)
            }
            Ok(Err(e)) if e.is_timeout() => {
                tracing::debug!(url = %self.url, "request timed out in client: {e}");
                Outcome::Failure(FailureReason::Timeout)
            }
            Ok(Err(e)) => {
                let reason = describe_transport_error(&e);
                tracing::debug!(url = %self.url, "request failed: {reason}");
                Outcome::Failure(FailureReason::Transport(reason))
            }
            Err(_) => {
                tracing::debug!(
                    url = %self.url,
                    "request aborted after {}ms",
                    self.timeout.as_millis()
                );
                Outcome::Failure(FailureReason::Timeout)
            }
        }
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    let kind = if e.is_connect() {
        "connection refused or host unreachable"
    } else if e.is_body() || e.is_decode() {
        "response body interrupted"
    } else if e.is_request() {
        "request could not be sent"
    } else {
        "network error"
    };
    format!("{kind}: {e}")
}
