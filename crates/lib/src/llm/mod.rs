//! Model Gateway: the boundary that calls a hosted chat-completion model.
//!
//! One attempt per call; no retry, streaming or caching. The proxy depends on the
//! [`ModelGateway`] trait so tests can swap the hosted model for a stub.

mod openai;

pub use openai::OpenAiClient;

use serde::{Deserialize, Serialize};

/// Role of one entry in the model's message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One `{role, content}` entry sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-success status from the provider (auth, quota, bad request).
    #[error("model api error: {0}")]
    Api(String),
    #[error("no model credential configured (set OPENAI_API_KEY or model.apiKey)")]
    MissingCredential,
    #[error("malformed model response: {0}")]
    Malformed(String),
}

/// Sends an instruction plus a conversation to a hosted model and returns the generated text.
#[async_trait::async_trait]
pub trait ModelGateway: Send + Sync {
    /// `instruction` becomes the single leading system entry; `messages` follow in order.
    async fn complete(
        &self,
        instruction: &str,
        messages: &[ChatMessage],
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String, GatewayError>;
}
