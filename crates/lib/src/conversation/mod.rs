//! Client-side conversation model: messages, conversations, session history and the
//! view state machine that drives the desktop and terminal clients.
//!
//! Nothing here is persisted; everything lives for the process lifetime.

mod state;

pub use state::{
    ChatState, SummaryRequest, SummaryState, TurnPhase, TurnRequest, SUMMARY_ERROR_TEXT,
};

use serde::{Deserialize, Serialize};

/// Title shown for a conversation that has no user message yet.
pub const UNTITLED: &str = "New conversation";

/// Maximum characters of the first user message used as a title.
const TITLE_MAX_CHARS: usize = 40;

/// Who authored a message. Wire form is lowercase; `bot` is accepted as an alias for `assistant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "bot")]
    Assistant,
    Quote,
}

/// A single chat message. Immutable once appended; position is its only identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }

    pub fn quote(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Quote,
            text: text.into(),
        }
    }

    /// True when the text is empty or whitespace only (such messages are never sent to the model).
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Unique conversation identifier (opaque string).
pub type ConversationId = String;

/// Ordered, append-only list of messages with an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_messages(Vec::new())
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            id: format!("conv-{}", uuid::Uuid::new_v4()),
            messages,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.sender == Sender::User)
    }

    /// Sidebar title: first user message, whitespace-collapsed and truncated.
    pub fn title(&self) -> String {
        self.messages
            .iter()
            .find(|m| m.sender == Sender::User && !m.is_blank())
            .map(|m| truncate_title(&m.text))
            .unwrap_or_else(|| UNTITLED.to_string())
    }
}

fn truncate_title(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out.push('…');
    out
}

/// Snapshot of a past conversation kept in the sidebar. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<Message>,
    /// Local time the snapshot was taken, for display only.
    pub saved_at: String,
}

impl HistoryEntry {
    pub fn snapshot(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id.clone(),
            title: conversation.title(),
            messages: conversation.messages().to_vec(),
            saved_at: chrono::Local::now().format("%H:%M").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_wire_form() {
        assert_eq!(
            serde_json::to_string(&Message::user("hi")).unwrap(),
            r#"{"sender":"user","text":"hi"}"#
        );
        let m: Message = serde_json::from_str(r#"{"sender":"bot","text":"x"}"#).unwrap();
        assert_eq!(m.sender, Sender::Assistant);
        let m: Message = serde_json::from_str(r#"{"sender":"quote","text":"x"}"#).unwrap();
        assert_eq!(m.sender, Sender::Quote);
    }

    #[test]
    fn title_uses_first_user_message() {
        let mut c = Conversation::new();
        assert_eq!(c.title(), UNTITLED);
        c.push(Message::assistant("Welcome"));
        c.push(Message::user("  My 1975 911\n idles rough  "));
        c.push(Message::user("second"));
        assert_eq!(c.title(), "My 1975 911 idles rough");
    }

    #[test]
    fn long_title_is_truncated() {
        let mut c = Conversation::new();
        c.push(Message::user(
            "My 1973 914 2.0 with dual Webers stumbles off idle when warm and smells rich",
        ));
        let title = c.title();
        assert!(title.ends_with('…'));
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 1);
        assert!(title.starts_with("My 1973 914 2.0"));
    }

    #[test]
    fn snapshot_copies_messages() {
        let mut c = Conversation::new();
        c.push(Message::user("oil leak"));
        let entry = HistoryEntry::snapshot(&c);
        assert_eq!(entry.id, c.id);
        assert_eq!(entry.title, "oil leak");
        assert_eq!(entry.messages, c.messages());
    }
}
