use super::ensure_success;
use crate::config::Config;
use crate::error::BotError;
use crate::types::openai::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use std::time::Duration;
use tracing::{debug, info};

/// OpenAI chat completions caller.
#[derive(Clone)]
pub struct OpenAiApi {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_completion_tokens: u32,
    timeout: Duration,
}

impl OpenAiApi {
    pub fn new(http: reqwest::Client, cfg: &Config) -> Result<Self, BotError> {
        Ok(Self {
            http,
            url: cfg.openai_url("chat/completions"),
            api_key: cfg.require_openai_api_key()?.to_string(),
            model: cfg.openai_model.clone(),
            max_completion_tokens: cfg.openai_max_completion_tokens,
            timeout: Duration::from_secs(cfg.timeout_openai_secs),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one system + user exchange and return the first choice's text.
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String, BotError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            max_completion_tokens: self.max_completion_tokens,
            n: 1,
        };
        info!(model = %self.model, "Requesting chat completion");

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;
        let completion: ChatCompletionResponse = ensure_success(resp).await?.json().await?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            BotError::UnexpectedResponse("chat completion returned no choices".to_string())
        })?;
        debug!(finish_reason = ?choice.finish_reason, "Chat completion received");
        choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| BotError::UnexpectedResponse("chat completion was empty".to_string()))
    }
}
