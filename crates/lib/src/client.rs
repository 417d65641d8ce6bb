//! HTTP client for the chat proxy, used by the terminal and desktop front ends.

use crate::conversation::Message;
use crate::proxy::{ChatReply, ProxyRequest, SummaryReply};
use std::time::Duration;

/// reqwest client whose requests give up after `timeout`.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(c) => c,
        Err(e) => {
            log::warn!("building http client with timeout failed: {}; using defaults", e);
            reqwest::Client::new()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("proxy request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("proxy returned status {0}: {1}")]
    Status(u16, String),
    #[error("unexpected proxy response: {0}")]
    Decode(String),
    #[error("starting client runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Client for the proxy's `/api/chat` and `/api/summary` endpoints.
#[derive(Clone)]
pub struct ProxyClient {
    base_url: String,
    client: reqwest::Client,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(150))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(timeout),
        }
    }

    /// Build from the `client` config section; `proxy_url` overrides `client.proxyUrl`.
    pub fn from_config(config: &crate::config::ClientConfig, proxy_url: Option<String>) -> Self {
        Self::with_timeout(
            proxy_url.unwrap_or_else(|| config.proxy_url.clone()),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /api/chat with the full conversation.
    /// A `reply` body is accepted whatever the status, so the proxy's fallback text reaches the
    /// user as the reply.
    pub async fn submit_turn(&self, messages: &[Message]) -> Result<String, ClientError> {
        let url = format!("{}/api/chat", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&ProxyRequest { messages })
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        match serde_json::from_str::<ChatReply>(&body) {
            Ok(r) => {
                if !status.is_success() {
                    log::warn!("chat proxy returned {}; showing fallback reply", status);
                }
                Ok(r.reply)
            }
            Err(_) if !status.is_success() => Err(ClientError::Status(status.as_u16(), body)),
            Err(e) => Err(ClientError::Decode(e.to_string())),
        }
    }

    /// POST /api/summary with the full conversation. Any non-success status is an error.
    pub async fn summarize(&self, messages: &[Message]) -> Result<String, ClientError> {
        let url = format!("{}/api/summary", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&ProxyRequest { messages })
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16(), body));
        }
        serde_json::from_str::<SummaryReply>(&body)
            .map(|r| r.summary)
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Run a proxy call to completion on a fresh current-thread runtime. For UI worker threads.
pub fn block_on<F, T>(fut: F) -> Result<T, ClientError>
where
    F: std::future::Future<Output = Result<T, ClientError>>,
{
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(fut)
}
