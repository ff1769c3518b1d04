//! Per-session conversation state.

use capstan_core::error::ProtocolViolation;
use capstan_core::message::{Conversation, Message};

/// Everything one agent session owns: the authoritative history, the
/// skills enabled so far, and system injections waiting for the current
/// call batch to close.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    conversation: Conversation,
    enabled: Vec<String>,
    pending: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session whose first message is `prompt`.
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            conversation: Conversation::with_system_prompt(prompt),
            ..Self::default()
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub(crate) fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.snapshot()
    }

    pub fn append(&mut self, message: Message) -> Result<(), ProtocolViolation> {
        self.conversation.append(message)
    }

    pub fn is_enabled(&self, skill: &str) -> bool {
        self.enabled.iter().any(|s| s == skill)
    }

    /// Enabled skill names, in the order they were enabled.
    pub fn enabled_skills(&self) -> &[String] {
        &self.enabled
    }

    /// Returns false if the skill was already enabled.
    pub(crate) fn mark_enabled(&mut self, skill: &str) -> bool {
        if self.is_enabled(skill) {
            return false;
        }
        self.enabled.push(skill.to_string());
        true
    }

    pub(crate) fn queue_injection(&mut self, message: Message) {
        self.pending.push(message);
    }

    pub fn pending_injections(&self) -> &[Message] {
        &self.pending
    }

    /// Append every pending injection to the history.
    ///
    /// Fails without consuming the buffer while calls are still
    /// outstanding. Returns how many messages were appended.
    pub fn flush_injections(&mut self) -> Result<usize, ProtocolViolation> {
        let outstanding = self.conversation.outstanding_calls();
        if !outstanding.is_empty() && !self.pending.is_empty() {
            return Err(ProtocolViolation::CallsOutstanding {
                role: "system".into(),
                pending: outstanding.to_vec(),
            });
        }

        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for message in pending {
            self.conversation.append(message)?;
        }
        Ok(count)
    }
}
