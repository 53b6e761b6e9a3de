//! HTTP Transport (§4.E): per-request timeout, retry/backoff with
//! `Retry-After` honoring, and an SSE streaming reader. Grounded in the
//! manual-SSE-parsing idiom used for OpenAI-compatible providers across the
//! pack (buffer `response.bytes_stream()`, split on blank lines, strip the
//! `data: ` prefix, stop at the `[DONE]` sentinel).

mod retry_after;
mod stream;

pub use retry_after::parse_retry_after;
pub use stream::{read_sse_stream, StreamSink};

use crate::error::AgentError;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Runs `request` under `timeout_ms`, converting any cancellation-class
/// error into [`AgentError::FetchTimeout`] while passing other errors
/// through unchanged (§4.E).
pub async fn fetch_with_timeout<F, T>(timeout_ms: u64, request: F) -> Result<T, AgentError>
where
    F: std::future::Future<Output = Result<T, reqwest::Error>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), request).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            if e.is_timeout() {
                Err(AgentError::FetchTimeout)
            } else {
                Err(AgentError::RuntimeError(crate::error::redact(&e.to_string())))
            }
        }
        Err(_elapsed) => Err(AgentError::FetchTimeout),
    }
}

/// Configuration for [`fetch_with_retry`].
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            retryable_statuses: vec![500, 502, 503],
        }
    }
}

/// Outcome of one attempt, used to decide whether `on_retry` should fire
/// with a human-readable reason (matching scenario 4's `reason:"http_503"`
/// shape).
fn retry_reason(status: StatusCode) -> String {
    format!("http_{}", status.as_u16())
}

/// Sends `request_builder` (cloned per attempt) with timeout + retry.
/// Retries iff the response status is in `retryable_statuses`, or 429, or
/// the attempt times out. Non-retryable HTTP errors (e.g. 400/401) are
/// returned without retrying. Exhaustion on a transport-level error raises
/// `RETRY_EXHAUSTED`; exhaustion on an HTTP status returns the last
/// response as-is (§4.E).
pub async fn fetch_with_retry<F>(
    client: &Client,
    build: F,
    timeout_ms: u64,
    cfg: &RetryConfig,
    mut on_retry: impl FnMut(u32, &str),
) -> Result<Response, AgentError>
where
    F: Fn(&Client) -> reqwest::RequestBuilder,
{
    let attempts = cfg.max_retries + 1;
    let mut last_transport_err: Option<AgentError> = None;
    let mut last_response: Option<Response> = None;

    for attempt in 0..attempts {
        let req = build(client).build().map_err(|e| {
            AgentError::RuntimeError(crate::error::redact(&e.to_string()))
        })?;
        let result = fetch_with_timeout(timeout_ms, client.execute(req)).await;

        match result {
            Ok(response) => {
                let status = response.status();
                let retryable = cfg.retryable_statuses.contains(&status.as_u16())
                    || status.as_u16() == 429;
                if !retryable || attempt + 1 == attempts {
                    return Ok(response);
                }
                let delay = if status.as_u16() == 429 {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| parse_retry_after(s, cfg.max_delay_ms));
                    retry_after.unwrap_or_else(|| backoff_delay(attempt, cfg))
                } else {
                    backoff_delay(attempt, cfg)
                };
                on_retry(attempt, &retry_reason(status));
                last_response = Some(response);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(AgentError::FetchTimeout) => {
                if attempt + 1 == attempts {
                    return Err(AgentError::RetryExhausted(
                        "request timed out on final attempt".to_string(),
                    ));
                }
                let delay = backoff_delay(attempt, cfg);
                on_retry(attempt, "fetch_timeout");
                last_transport_err = Some(AgentError::FetchTimeout);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(other) => return Err(other),
        }
    }

    if let Some(response) = last_response {
        return Ok(response);
    }
    Err(AgentError::RetryExhausted(
        last_transport_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "retries exhausted".to_string()),
    ))
}

fn backoff_delay(attempt: u32, cfg: &RetryConfig) -> u64 {
    let raw = cfg.base_delay_ms.saturating_mul(1u64 << attempt.min(20));
    raw.min(cfg.max_delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let cfg = RetryConfig::default();
        assert_eq!(backoff_delay(0, &cfg), 1000);
        assert_eq!(backoff_delay(1, &cfg), 2000);
        assert_eq!(backoff_delay(2, &cfg), 4000);
        assert_eq!(backoff_delay(10, &cfg), cfg.max_delay_ms);
    }
}
