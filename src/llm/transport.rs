use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tokio::time::sleep;

use crate::llm::provider::ChatOptions;

const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryConfig {
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl From<ChatOptions> for RetryConfig {
    fn from(options: ChatOptions) -> Self {
        Self {
            timeout_secs: options.timeout_secs,
            retries: options.retries,
            retry_delay_ms: options.retry_delay_ms,
        }
    }
}

#[derive(Debug)]
pub(crate) enum RequestFailure {
    Request(reqwest::Error),
    Api { status: StatusCode, body: String },
}

impl RequestFailure {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Request(source) => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
        }
    }
}

/// POSTs a JSON payload with bearer auth, retrying 429/5xx and transport
/// errors with exponential backoff. Retries are off unless configured.
pub(crate) async fn send_json_request_with_retry<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    payload: &T,
    config: RetryConfig,
) -> Result<reqwest::Response, RequestFailure> {
    let max_attempts = config.retries.saturating_add(1);

    for attempt in 0..max_attempts {
        let mut request = client.post(url).bearer_auth(api_key).json(payload);
        if let Some(timeout_secs) = config.timeout_secs {
            request = request.timeout(Duration::from_secs(timeout_secs));
        }

        let failure = match request.send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                RequestFailure::Api { status, body }
            }
            Err(source) => RequestFailure::Request(source),
        };

        if failure.is_retryable() && attempt + 1 < max_attempts {
            sleep(backoff_delay(attempt, config.retry_delay_ms)).await;
            continue;
        }
        return Err(failure);
    }

    unreachable!("at least one attempt is always made")
}

fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
}
