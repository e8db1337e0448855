//! Shared HTTP plumbing for the provider clients.

use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(1000);

/// Classifies a non-success response into an error and whether a retry is
/// worthwhile.
pub(crate) type ErrorClassifier = fn(reqwest::StatusCode, &str) -> (GatewayError, bool);

/// Sends a request, retrying transient failures with exponential backoff,
/// and returns the success body.
///
/// `build` must produce a fresh `RequestBuilder` per attempt since builders
/// are consumed on send.
pub(crate) async fn post_with_retry(
    provider: &str,
    build: impl Fn() -> reqwest::RequestBuilder,
    classify: ErrorClassifier,
) -> Result<String> {
    let mut backoff = BASE_BACKOFF;
    let mut last_error = None;

    for attempt in 1..=MAX_ATTEMPTS {
        debug!(provider, attempt, "sending API request");

        let (error, retryable) = match build().send().await {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .map_err(|e| GatewayError::llm(format!("Failed to read response: {}", e)))?;

                if status.is_success() {
                    return Ok(body);
                }
                classify(status, &body)
            }
            Err(e) if e.is_timeout() => {
                (GatewayError::llm("Request timed out. Try again."), true)
            }
            Err(e) if e.is_connect() => (
                GatewayError::llm(format!(
                    "Failed to connect to the {} API. Check your network.",
                    provider
                )),
                true,
            ),
            Err(e) => (GatewayError::llm(format!("Request failed: {}", e)), false),
        };

        last_error = Some(error);
        if !retryable || attempt == MAX_ATTEMPTS {
            break;
        }

        warn!(provider, attempt, "API request failed, retrying in {:?}", backoff);
        tokio::time::sleep(backoff).await;
        backoff *= 2;
    }

    Err(last_error.expect("at least one attempt was made"))
}
