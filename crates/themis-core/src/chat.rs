use chrono::Utc;
use tracing::debug;

use crate::types::{ChatTurn, Message, MessageBody, MessageState, Role, StructuredResult};

/// Shown in place of an AI reply whose stream failed.
pub const STREAM_ERROR_TEXT: &str = "Προέκυψε σφάλμα. Προσπαθήστε ξανά.";

/// Shown in place of an AI reply that was aborted before any text arrived.
pub const INTERRUPTED_TEXT: &str = "Η απάντηση διακόπηκε.";

/// A turn that has been opened on the transcript and now needs a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    /// Id of the pending AI message that will receive fragments.
    pub ai_id: String,
    /// History through the user message that prompted this turn.
    pub history: Vec<ChatTurn>,
}

/// Ordered chat transcript with an optional grounding context.
///
/// At most one AI message is in progress at a time and it is always the last
/// message. Opening a new turn while one is still in progress settles the old
/// one first (partial text is kept).
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    context: Option<StructuredResult>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn context(&self) -> Option<&StructuredResult> {
        self.context.as_ref()
    }

    pub fn set_context(&mut self, context: Option<StructuredResult>) {
        self.context = context;
    }

    /// The AI message currently receiving fragments, if any.
    pub fn in_progress(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.state.in_progress())
    }

    /// Append a user message and a pending AI reply.
    pub fn begin_submit(&mut self, text: &str) -> PendingTurn {
        self.settle_in_progress();
        let user = self.new_message(Role::User, MessageBody::Text(text.to_string()), MessageState::Complete);
        self.messages.push(user);
        self.open_ai_turn()
    }

    /// Rewrite a complete user message, drop everything after it and open a
    /// new AI reply. Returns `None` if `id` is not a complete user message.
    pub fn begin_edit(&mut self, id: &str, text: &str) -> Option<PendingTurn> {
        self.settle_in_progress();
        let Some(idx) = self.messages.iter().position(|m| m.id == id) else {
            debug!(id, "edit target not found");
            return None;
        };
        if !self.messages[idx].is_complete_user() {
            debug!(id, "edit target is not a complete user message");
            return None;
        }
        self.messages.truncate(idx + 1);
        self.messages[idx].body = MessageBody::Text(text.to_string());
        Some(self.open_ai_turn())
    }

    /// Replace the final AI reply with a fresh pending one. Returns `None`
    /// unless the last message is a complete AI reply preceded by a user
    /// message.
    pub fn begin_regenerate(&mut self) -> Option<PendingTurn> {
        self.settle_in_progress();
        if !self.messages.last().is_some_and(Message::is_complete_ai) {
            debug!("regenerate: last message is not a complete AI reply");
            return None;
        }
        let Some(user_idx) = self.messages.iter().rposition(|m| m.role == Role::User) else {
            debug!("regenerate: no prior user message");
            return None;
        };
        let history = self.messages[..=user_idx].iter().map(ChatTurn::from).collect();
        self.messages.pop();
        Some(self.push_pending_ai(history))
    }

    /// Append a stream fragment to the in-progress AI message `ai_id`.
    /// Returns false (and changes nothing) for any other target.
    pub fn append_fragment(&mut self, ai_id: &str, fragment: &str) -> bool {
        let Some(msg) = self.in_progress_mut(ai_id) else {
            return false;
        };
        if let MessageBody::Text(content) = &mut msg.body {
            content.push_str(fragment);
        }
        msg.state = MessageState::Streaming;
        true
    }

    /// Mark the in-progress AI message as complete.
    pub fn complete(&mut self, ai_id: &str) -> bool {
        let Some(msg) = self.in_progress_mut(ai_id) else {
            return false;
        };
        msg.state = MessageState::Complete;
        true
    }

    /// Replace the in-progress AI message with the fixed error text.
    pub fn fail(&mut self, ai_id: &str) -> bool {
        let Some(msg) = self.in_progress_mut(ai_id) else {
            return false;
        };
        msg.body = MessageBody::Text(STREAM_ERROR_TEXT.to_string());
        msg.state = MessageState::Complete;
        true
    }

    /// Stop an in-progress AI message where it is.
    pub fn interrupt(&mut self, ai_id: &str) -> bool {
        let Some(msg) = self.in_progress_mut(ai_id) else {
            return false;
        };
        if msg.text().is_empty() {
            msg.body = MessageBody::Text(INTERRUPTED_TEXT.to_string());
        }
        msg.state = MessageState::Complete;
        true
    }

    /// Append an analysis as a complete AI message and make it the context
    /// for later turns.
    pub fn record_analysis(&mut self, result: StructuredResult) -> String {
        self.settle_in_progress();
        let msg = self.new_message(Role::Ai, MessageBody::Structured(result.clone()), MessageState::Complete);
        let id = msg.id.clone();
        self.messages.push(msg);
        self.context = Some(result);
        id
    }

    /// Clear all messages and the context. Ids are not reused afterwards.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.context = None;
    }

    fn in_progress_mut(&mut self, ai_id: &str) -> Option<&mut Message> {
        self.messages
            .last_mut()
            .filter(|m| m.id == ai_id && m.role == Role::Ai && m.state.in_progress())
    }

    fn settle_in_progress(&mut self) {
        if let Some(id) = self.in_progress().map(|m| m.id.clone()) {
            debug!(id = %id, "settling abandoned AI turn");
            self.interrupt(&id);
        }
    }

    fn open_ai_turn(&mut self) -> PendingTurn {
        let history = self.messages.iter().map(ChatTurn::from).collect();
        self.push_pending_ai(history)
    }

    fn push_pending_ai(&mut self, history: Vec<ChatTurn>) -> PendingTurn {
        let ai = self.new_message(Role::Ai, MessageBody::Text(String::new()), MessageState::Pending);
        let ai_id = ai.id.clone();
        self.messages.push(ai);
        PendingTurn { ai_id, history }
    }

    fn new_message(&mut self, role: Role, body: MessageBody, state: MessageState) -> Message {
        self.next_id += 1;
        let prefix = match role {
            Role::User => "user",
            Role::Ai => "ai",
        };
        Message {
            id: format!("{prefix}-{}", self.next_id),
            role,
            body,
            state,
            created_at: Utc::now(),
        }
    }
}
