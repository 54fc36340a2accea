use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::traits::Provider;
use super::ProviderError;
use crate::app::ProviderSettings;
use crate::constants::PING_PROMPT;

/// OpenAI-compatible chat completions client
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": text }],
            "stream": false,
        })
    }

    async fn post(&self, credential: &str, text: &str) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(credential)
            .json(&self.request_body(text))
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn prompt(&self, credential: &str, text: &str) -> Result<String, ProviderError> {
        let response = self.post(credential, text).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        debug!(model = %self.model, "provider answered");
        completion.into_answer()
    }

    async fn ping(&self, credential: &str) -> Result<(), ProviderError> {
        let response = self.post(credential, PING_PROMPT).await?;
        let status = response.status();
        if is_reachable_status(status) {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Status { status, body })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Ping accepts an authorized "bad request" alongside any success
fn is_reachable_status(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::BAD_REQUEST
}

// Response structures (OpenAI format)

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    /// Null for refusals and tool calls
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice
    fn into_answer(self) -> Result<String, ProviderError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyResponse)
    }
}
