//! HTTP plumbing shared by remote embedders and generators

use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Longest wait honored from a `Retry-After` header
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Build an HTTP client with a request timeout
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(5)
        .build()
        .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))
}

/// Retry a request with exponential backoff.
///
/// Only retryable errors are retried; a rate limit's `Retry-After` replaces
/// the computed delay.
pub(crate) async fn retry_request<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                let delay = match &e {
                    Error::RateLimit {
                        retry_after: Some(after),
                        ..
                    } => (*after).min(MAX_RETRY_AFTER),
                    _ => Duration::from_secs(2u64.pow(attempt)),
                };
                tracing::warn!(
                    "Request failed (attempt {}/{}): {}, retrying in {:?}",
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Map a non-success HTTP response to the error taxonomy
pub(crate) fn map_http_error(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
    model: &str,
    timeout: Duration,
) -> Error {
    let message = error_message(body);
    let lowered = message.to_lowercase();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication(message),
        StatusCode::PAYMENT_REQUIRED => Error::QuotaExceeded(message),
        StatusCode::TOO_MANY_REQUESTS if lowered.contains("quota") => Error::QuotaExceeded(message),
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimit {
            message,
            retry_after,
        },
        StatusCode::NOT_FOUND => Error::model_unavailable(model, message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Error::Timeout(timeout),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY if names_bad_model(&lowered) => {
            Error::model_unavailable(model, message)
        }
        _ => Error::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}

/// Map a failed embedding request, recognizing inputs over the model's
/// context window.
///
/// Providers rarely report the exact token count, so when the message names
/// no count above `limit` the input is assumed to be twice the limit.
pub(crate) fn map_embedding_error(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
    model: &str,
    timeout: Duration,
    limit: usize,
) -> Error {
    let message = error_message(body);
    let overlong = match status {
        StatusCode::PAYLOAD_TOO_LARGE => true,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            names_overlong_input(&message.to_lowercase())
        }
        _ => false,
    };

    if !overlong {
        return map_http_error(status, body, retry_after, model, timeout);
    }

    let limit = limit.max(1);
    let tokens = numbers_in(&message)
        .filter(|n| *n > limit)
        .max()
        .unwrap_or(limit * 2);
    Error::InputTooLong { tokens, limit }
}

/// Map a transport failure, distinguishing timeouts
pub(crate) fn map_transport_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout(timeout)
    } else {
        Error::Http(err)
    }
}

pub(crate) fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Pull a message out of the common provider error shapes:
/// `{"error": {"message": ..}}`, `{"error": ".."}` or `{"message": ..}`
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let found = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("error"))
            .or_else(|| v.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });

    match found {
        Some(msg) => msg,
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.chars().take(500).collect(),
    }
}

fn names_bad_model(message: &str) -> bool {
    message.contains("model")
        && ["not supported", "does not exist", "not found", "unknown", "invalid"]
            .iter()
            .any(|needle| message.contains(needle))
}

fn names_overlong_input(message: &str) -> bool {
    ["too long", "maximum sequence", "must have less than", "context length"]
        .iter()
        .any(|needle| message.contains(needle))
        || (message.contains("exceeds") && (message.contains("token") || message.contains("length")))
}

fn numbers_in(message: &str) -> impl Iterator<Item = usize> + '_ {
    message
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|digits| digits.parse().ok())
}
