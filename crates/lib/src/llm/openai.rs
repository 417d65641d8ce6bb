//! OpenAI-compatible chat-completion client (https://api.openai.com/v1 by default).
//! Non-streaming only: POST {base}/chat/completions and read the first choice.

use crate::llm::{ChatMessage, GatewayError, ModelGateway};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for an OpenAI-compatible chat-completion API.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        base_url: Option<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            model: model.into(),
            api_key,
            client: crate::client::http_client(Duration::from_secs(120)),
        }
    }

    /// Give up on a completion after `timeout`; the failure surfaces as `GatewayError::Request`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = crate::client::http_client(timeout);
        self
    }

    /// Build from the `model` config section and the resolved credential.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            Some(config.model.base_url.clone()),
            config.model.model.clone(),
            crate::config::resolve_api_key(config),
        )
        .with_timeout(Duration::from_secs(config.model.request_timeout_secs))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl ModelGateway for OpenAiClient {
    /// POST /chat/completions: one attempt, no streaming.
    async fn complete(
        &self,
        instruction: &str,
        messages: &[ChatMessage],
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String, GatewayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GatewayError::MissingCredential)?;
        let url = format!("{}/chat/completions", self.base_url);
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(ChatMessage::system(instruction));
        wire.extend_from_slice(messages);
        let body = OpenAiChatRequest {
            model: &self.model,
            messages: &wire,
            temperature,
            max_tokens: max_output_tokens,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(GatewayError::Api(format!("{} {}", status, body)));
        }
        let data: OpenAiChatResponse = res
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        first_choice_content(data)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Option<Vec<OpenAiChoice>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

fn first_choice_content(data: OpenAiChatResponse) -> Result<String, GatewayError> {
    data.choices
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| GatewayError::Malformed("no choices".to_string()))?
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| GatewayError::Malformed("first choice has no content".to_string()))
}
