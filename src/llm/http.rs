//! HTTP plumbing shared by the provider clients.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use super::config::LlmTimeouts;
use super::types::LlmError;

/// Build a `reqwest` client honoring the configured timeouts.
pub(crate) fn build_client(timeouts: LlmTimeouts) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
        .map_err(|e| LlmError::HttpClientBuild(e.to_string()))
}

/// Send `body` as JSON and return the raw response text. Any status other
/// than 200 becomes [`LlmError::ApiResponse`] carrying the body.
pub(crate) async fn post_json<B: Serialize + ?Sized>(
    provider: &'static str,
    request: reqwest::RequestBuilder,
    body: &B,
) -> Result<String, LlmError> {
    let started = Instant::now();
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    debug!(provider, status, elapsed_ms, body_len = text.len(), "llm: http response");

    if status != 200 {
        return Err(LlmError::ApiResponse { status, body: text });
    }
    Ok(text)
}

/// Join a configured base URL and an endpoint path.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
