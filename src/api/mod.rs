//! Stateless callers for the upstream HTTP APIs.

pub mod openai_api;
pub mod x_api;

pub use openai_api::OpenAiApi;
pub use x_api::{TokenCheck, XApi};

use crate::error::BotError;
use std::time::Duration;

/// Shared client for API calls; per-request timeouts are set at the call site.
pub fn build_http_client() -> Result<reqwest::Client, BotError> {
    let client = reqwest::Client::builder()
        .user_agent(crate::USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .build()?;
    Ok(client)
}

/// Turn a non-2xx response into `UpstreamStatus`, keeping the body for logs.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, BotError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BotError::UpstreamStatus { status, body })
}
