//! Chat proxy wire types and the message filtering/mapping shared by both endpoints.

use crate::conversation::Message;
use crate::llm::ChatMessage;
use serde::{Deserialize, Serialize};

/// Returned as `reply` when the chat call fails.
pub const CHAT_FALLBACK: &str = "Sorry, there was an error processing your request.";

/// Returned as `summary` when the summary call fails.
pub const SUMMARY_FALLBACK: &str = "Sorry, there was an error generating the summary.";

/// Request body sent by clients: `{ "messages": [ {sender, text}, ... ] }`.
#[derive(Debug, Serialize)]
pub struct ProxyRequest<'a> {
    pub messages: &'a [Message],
}

/// Request body as received. Entries stay untyped so one odd entry does not reject the whole
/// conversation.
#[derive(Debug, Deserialize)]
struct IncomingRequest {
    messages: Vec<serde_json::Value>,
}

/// `POST /api/chat` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// `POST /api/summary` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReply {
    pub summary: String,
}

/// Parse a request body into the conversation entries forwarded to the model.
/// Fails only when the body is not JSON or `messages` is missing or not an array.
pub fn parse_request(body: &[u8]) -> Result<Vec<ChatMessage>, serde_json::Error> {
    let req: IncomingRequest = serde_json::from_slice(body)?;
    Ok(to_model_messages(&req.messages))
}

/// Drop entries without a non-blank string `text`, then map `user` to the user role and every
/// other sender to assistant.
/// Order is preserved and text is forwarded verbatim.
pub fn to_model_messages(entries: &[serde_json::Value]) -> Vec<ChatMessage> {
    entries
        .iter()
        .filter_map(|entry| {
            let text = entry.get("text")?.as_str()?;
            if text.trim().is_empty() {
                return None;
            }
            let is_user = entry.get("sender").and_then(|s| s.as_str()) == Some("user");
            Some(if is_user {
                ChatMessage::user(text)
            } else {
                ChatMessage::assistant(text)
            })
        })
        .collect()
}
