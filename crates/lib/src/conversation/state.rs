//! View state for one client window: the active conversation, the history sidebar and the
//! summary overlay. Every mutation is a method so front ends stay thin and the transitions
//! can be tested without a UI.
//!
//! Outbound calls are tagged with a generation. A result is applied only while the state is
//! still waiting for that generation, so replies to abandoned requests are dropped.

use crate::client::ClientError;
use crate::conversation::{Conversation, ConversationId, HistoryEntry, Message};
use crate::export::{ExportDocument, PageLayout};
use crate::quotes;

/// Shown in the overlay when the summary request fails.
pub const SUMMARY_ERROR_TEXT: &str = "Failed to generate summary. Please try again.";

/// Chat turn state: `Idle → AwaitingReply → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingReply { generation: u64 },
}

/// Summary overlay state: `Hidden → Loading → Ready | Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SummaryState {
    #[default]
    Hidden,
    Loading { generation: u64 },
    Ready(String),
    Failed(String),
}

/// Outbound chat call produced by [`ChatState::send_turn`].
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub generation: u64,
    pub messages: Vec<Message>,
}

/// Outbound summary call produced by [`ChatState::request_summary`].
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub generation: u64,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone)]
pub struct ChatState {
    conversation: Conversation,
    /// Text currently in the input box.
    pub input: String,
    /// Saved conversations, newest first.
    history: Vec<HistoryEntry>,
    /// History entry currently shown, if the conversation was loaded from the sidebar.
    active_history_id: Option<ConversationId>,
    sidebar_open: bool,
    /// Quote shown above the conversation.
    banner: Message,
    turn: TurnPhase,
    /// Visible error from the last chat turn (network failure reaching the proxy).
    turn_error: Option<String>,
    summary: SummaryState,
    next_generation: u64,
    scroll_requested: bool,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatState {
    pub fn new() -> Self {
        Self::with_banner(quotes::random_quote())
    }

    pub fn with_banner(banner: Message) -> Self {
        Self {
            conversation: Conversation::new(),
            input: String::new(),
            history: Vec::new(),
            active_history_id: None,
            sidebar_open: false,
            banner,
            turn: TurnPhase::Idle,
            turn_error: None,
            summary: SummaryState::Hidden,
            next_generation: 0,
            scroll_requested: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn active_history_id(&self) -> Option<&str> {
        self.active_history_id.as_deref()
    }

    pub fn banner(&self) -> &Message {
        &self.banner
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn turn(&self) -> TurnPhase {
        self.turn
    }

    pub fn is_awaiting_reply(&self) -> bool {
        matches!(self.turn, TurnPhase::AwaitingReply { .. })
    }

    pub fn turn_error(&self) -> Option<&str> {
        self.turn_error.as_deref()
    }

    pub fn summary(&self) -> &SummaryState {
        &self.summary
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn append(&mut self, message: Message) {
        self.conversation.push(message);
        self.scroll_requested = true;
    }

    /// Append the input as a user message and start waiting for the reply.
    /// Returns `None` (and changes nothing) for blank input or while a reply is outstanding.
    pub fn send_turn(&mut self) -> Option<TurnRequest> {
        if self.input.trim().is_empty() || self.is_awaiting_reply() {
            return None;
        }
        let text = std::mem::take(&mut self.input);
        self.turn_error = None;
        self.append(Message::user(text));
        let generation = self.bump_generation();
        self.turn = TurnPhase::AwaitingReply { generation };
        Some(TurnRequest {
            generation,
            messages: self.conversation.messages().to_vec(),
        })
    }

    /// Join a chat result back into state. Returns false when the result was stale and dropped.
    /// On success exactly one assistant message is appended; on failure none, and the error is
    /// kept for display.
    pub fn receive_reply(&mut self, generation: u64, result: Result<String, ClientError>) -> bool {
        if self.turn != (TurnPhase::AwaitingReply { generation }) {
            log::debug!("dropping stale chat reply (generation {})", generation);
            return false;
        }
        self.turn = TurnPhase::Idle;
        match result {
            Ok(reply) => self.append(Message::assistant(reply)),
            Err(e) => {
                log::warn!("chat turn failed: {}", e);
                self.turn_error = Some(format!("Could not reach the assistant: {}", e));
                self.scroll_requested = true;
            }
        }
        true
    }

    /// Replace the active conversation with a saved one. Unknown ids leave state unchanged.
    pub fn load_history_entry(&mut self, id: &str) -> bool {
        let Some(entry) = self.history.iter().find(|h| h.id == id) else {
            return false;
        };
        self.conversation = Conversation {
            id: entry.id.clone(),
            messages: entry.messages.clone(),
        };
        self.active_history_id = Some(entry.id.clone());
        self.cancel_turn();
        self.scroll_requested = true;
        true
    }

    /// Save the current conversation to history (when it holds a user message) and start an
    /// empty one.
    pub fn new_conversation(&mut self) {
        self.archive_current();
        self.conversation = Conversation::new();
        self.active_history_id = None;
        self.banner = quotes::random_quote();
        self.cancel_turn();
        self.scroll_requested = true;
    }

    fn archive_current(&mut self) {
        if !self.conversation.has_user_message() {
            return;
        }
        if let Some(active) = self.active_history_id.as_deref() {
            let unchanged = self
                .history
                .iter()
                .any(|h| h.id == active && h.messages == self.conversation.messages());
            if unchanged {
                return;
            }
            // Continued after loading: the old snapshot stays as it was, the continuation gets
            // its own entry.
            self.conversation = Conversation::with_messages(self.conversation.messages().to_vec());
        }
        self.history.insert(0, HistoryEntry::snapshot(&self.conversation));
    }

    fn cancel_turn(&mut self) {
        self.turn = TurnPhase::Idle;
        self.turn_error = None;
        self.bump_generation();
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
    }

    /// Open the overlay in its loading state and return the outbound summary call.
    pub fn request_summary(&mut self) -> SummaryRequest {
        let generation = self.bump_generation();
        self.summary = SummaryState::Loading { generation };
        SummaryRequest {
            generation,
            messages: self.conversation.messages().to_vec(),
        }
    }

    /// Join a summary result back into state. Returns false when the result was stale and dropped.
    pub fn receive_summary(
        &mut self,
        generation: u64,
        result: Result<String, ClientError>,
    ) -> bool {
        if self.summary != (SummaryState::Loading { generation }) {
            log::debug!("dropping stale summary (generation {})", generation);
            return false;
        }
        self.summary = match result {
            Ok(text) => SummaryState::Ready(text),
            Err(e) => {
                log::warn!("summary failed: {}", e);
                SummaryState::Failed(SUMMARY_ERROR_TEXT.to_string())
            }
        };
        true
    }

    pub fn close_summary(&mut self) {
        self.summary = SummaryState::Hidden;
    }

    /// Export is only offered for a populated summary.
    pub fn can_export(&self) -> bool {
        matches!(self.summary, SummaryState::Ready(_))
    }

    pub fn export_document(&self, layout: &PageLayout) -> Option<ExportDocument> {
        match &self.summary {
            SummaryState::Ready(text) => Some(ExportDocument::from_summary(text, layout)),
            _ => None,
        }
    }

    /// True once after any message-list mutation; the view scrolls to the latest message.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }
}
