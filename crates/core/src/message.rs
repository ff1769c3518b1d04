//! Message and Conversation domain types.
//!
//! These are the protocol-agnostic value objects every adapter translates:
//! the user speaks, the assistant answers or requests calls, each call gets
//! exactly one tool result, and system messages carry standing instructions.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolViolation;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standing instructions (system prompt, skill injections)
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque id, unique within the conversation
    pub id: String,

    /// Name of the capability to invoke
    pub name: String,

    /// Structured arguments
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Mint an id for backends that don't supply one.
    pub fn synthesize_id() -> String {
        format!("call_{}", Uuid::new_v4().simple())
    }

    /// Fetch a string argument by key.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content. Absent on assistant messages that only carry calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<ToolCall>,

    /// If this is a tool result, which call it answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn build(
        role: Role,
        content: Option<String>,
        calls: Vec<ToolCall>,
        call_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            calls,
            call_id,
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::build(Role::System, Some(content.into()), Vec::new(), None)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::build(Role::User, Some(content.into()), Vec::new(), None)
    }

    /// Create a plain assistant answer.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::build(Role::Assistant, Some(content.into()), Vec::new(), None)
    }

    /// Create an assistant message that requests calls.
    pub fn assistant_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self::build(Role::Assistant, content, calls, None)
    }

    /// Create a tool result message.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::build(
            Role::Tool,
            Some(content.into()),
            Vec::new(),
            Some(call_id.into()),
        )
    }

    /// The text content, or `""` when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }
}

/// An ordered, append-only sequence of messages that enforces call/result
/// pairing on every append.
///
/// Once an assistant message opens a batch of calls, only tool results for
/// those calls may follow until every one is answered.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: ConversationId,
    messages: Vec<Message>,
    outstanding: Vec<String>,
    seen_call_ids: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            outstanding: Vec::new(),
            seen_call_ids: HashSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a conversation that opens with a system prompt.
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.messages.push(Message::system(prompt));
        conversation
    }

    /// Append a message, rejecting anything that would break pairing.
    pub fn append(&mut self, message: Message) -> Result<(), ProtocolViolation> {
        if message.has_calls() && message.role != Role::Assistant {
            return Err(ProtocolViolation::CallsOnNonAssistant(
                message.role.to_string(),
            ));
        }

        match message.role {
            Role::Tool => {
                let call_id = message
                    .call_id
                    .as_deref()
                    .ok_or(ProtocolViolation::MissingCallId)?;
                let pos = self
                    .outstanding
                    .iter()
                    .position(|id| id == call_id)
                    .ok_or_else(|| ProtocolViolation::UnmatchedResult {
                        call_id: call_id.to_string(),
                    })?;
                self.outstanding.remove(pos);
            }
            role => {
                if !self.outstanding.is_empty() {
                    return Err(ProtocolViolation::CallsOutstanding {
                        role: role.to_string(),
                        pending: self.outstanding.clone(),
                    });
                }
                if message.has_calls() {
                    let mut batch = HashSet::new();
                    for call in &message.calls {
                        if self.seen_call_ids.contains(&call.id) || !batch.insert(call.id.as_str())
                        {
                            return Err(ProtocolViolation::DuplicateCallId(call.id.clone()));
                        }
                    }
                    for call in &message.calls {
                        self.seen_call_ids.insert(call.id.clone());
                        self.outstanding.push(call.id.clone());
                    }
                }
            }
        }

        self.updated_at = Utc::now();
        self.messages.push(message);
        Ok(())
    }

    /// Immutable ordered view of the full history.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// Call ids from the latest assistant batch that still await results.
    pub fn outstanding_calls(&self) -> &[String] {
        &self.outstanding
    }

    /// Remove a closed single-call exchange: the assistant message at
    /// `index` (exactly one call) and its tool result at `index + 1`.
    pub fn remove_exchange(&mut self, index: usize) -> Result<(), ProtocolViolation> {
        if !self.is_single_exchange(index) {
            return Err(ProtocolViolation::NotAnExchange { index });
        }
        self.messages.drain(index..index + 2);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether `index` starts an assistant message with exactly one call that
    /// is answered by the very next message.
    pub fn is_single_exchange(&self, index: usize) -> bool {
        let (Some(call_msg), Some(result)) = (self.messages.get(index), self.messages.get(index + 1))
        else {
            return false;
        };
        call_msg.role == Role::Assistant
            && call_msg.calls.len() == 1
            && result.role == Role::Tool
            && result.call_id.as_deref() == Some(call_msg.calls[0].id.as_str())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall::new(id, name, serde_json::Map::new())
    }

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello, agent!");
        assert!(msg.calls.is_empty());
    }

    #[test]
    fn conversation_can_open_with_system_prompt() {
        let mut conv = Conversation::with_system_prompt("be brief");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.snapshot()[0].role, Role::System);
        conv.append(Message::user("hi")).unwrap();
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn assistant_calls_may_omit_content() {
        let msg = Message::assistant_calls(None, vec![call("c1", "list_files")]);
        assert!(msg.content.is_none());
        assert_eq!(msg.text(), "");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("content").is_none());
    }

    #[test]
    fn paired_exchange_appends_cleanly() {
        let mut conv = Conversation::new();
        conv.append(Message::system("be brief")).unwrap();
        conv.append(Message::user("hi")).unwrap();
        conv.append(Message::assistant_calls(None, vec![call("c1", "a"), call("c2", "b")]))
            .unwrap();
        assert_eq!(conv.outstanding_calls(), &["c1".to_string(), "c2".to_string()]);
        conv.append(Message::tool_result("c2", "two")).unwrap();
        conv.append(Message::tool_result("c1", "one")).unwrap();
        assert!(conv.outstanding_calls().is_empty());
        conv.append(Message::assistant("done")).unwrap();
        assert_eq!(conv.len(), 6);
    }

    #[test]
    fn unmatched_tool_result_is_rejected() {
        let mut conv = Conversation::new();
        conv.append(Message::user("hi")).unwrap();
        let err = conv.append(Message::tool_result("ghost", "boo")).unwrap_err();
        assert_eq!(
            err,
            ProtocolViolation::UnmatchedResult {
                call_id: "ghost".into()
            }
        );
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn result_answers_a_call_only_once() {
        let mut conv = Conversation::new();
        conv.append(Message::assistant_calls(None, vec![call("c1", "a")])).unwrap();
        conv.append(Message::tool_result("c1", "ok")).unwrap();
        assert!(matches!(
            conv.append(Message::tool_result("c1", "again")),
            Err(ProtocolViolation::UnmatchedResult { .. })
        ));
    }

    #[test]
    fn new_batch_cannot_open_while_calls_outstanding() {
        let mut conv = Conversation::new();
        conv.append(Message::assistant_calls(None, vec![call("c1", "a")])).unwrap();
        let err = conv
            .append(Message::assistant_calls(None, vec![call("c2", "b")]))
            .unwrap_err();
        assert!(matches!(err, ProtocolViolation::CallsOutstanding { .. }));
    }

    #[test]
    fn system_injection_waits_for_batch_to_close() {
        let mut conv = Conversation::new();
        conv.append(Message::assistant_calls(None, vec![call("c1", "enable_skill")]))
            .unwrap();
        assert!(conv.append(Message::system("injected")).is_err());
        conv.append(Message::tool_result("c1", "enabled")).unwrap();
        conv.append(Message::system("injected")).unwrap();
    }

    #[test]
    fn duplicate_call_ids_are_rejected() {
        let mut conv = Conversation::new();
        let err = conv
            .append(Message::assistant_calls(None, vec![call("c1", "a"), call("c1", "b")]))
            .unwrap_err();
        assert_eq!(err, ProtocolViolation::DuplicateCallId("c1".into()));

        conv.append(Message::assistant_calls(None, vec![call("c1", "a")])).unwrap();
        conv.append(Message::tool_result("c1", "ok")).unwrap();
        assert!(matches!(
            conv.append(Message::assistant_calls(None, vec![call("c1", "a")])),
            Err(ProtocolViolation::DuplicateCallId(_))
        ));
    }

    #[test]
    fn tool_result_without_call_id_is_rejected() {
        let mut conv = Conversation::new();
        let mut msg = Message::tool_result("x", "y");
        msg.call_id = None;
        assert_eq!(conv.append(msg), Err(ProtocolViolation::MissingCallId));
    }

    #[test]
    fn remove_exchange_drops_both_halves() {
        let mut conv = Conversation::new();
        conv.append(Message::user("hi")).unwrap();
        conv.append(Message::assistant_calls(None, vec![call("c1", "list_files")]))
            .unwrap();
        conv.append(Message::tool_result("c1", "a.txt")).unwrap();
        conv.append(Message::assistant("ok")).unwrap();

        assert!(conv.remove_exchange(0).is_err());
        conv.remove_exchange(1).unwrap();
        let roles: Vec<Role> = conv.snapshot().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[test]
    fn remove_exchange_refuses_multi_call_batches() {
        let mut conv = Conversation::new();
        conv.append(Message::assistant_calls(None, vec![call("c1", "a"), call("c2", "b")]))
            .unwrap();
        conv.append(Message::tool_result("c1", "1")).unwrap();
        conv.append(Message::tool_result("c2", "2")).unwrap();
        assert_eq!(
            conv.remove_exchange(0),
            Err(ProtocolViolation::NotAnExchange { index: 0 })
        );
    }

    #[test]
    fn str_arg_reads_string_arguments() {
        let args = json!({"expression": "2+2", "n": 3});
        let call = ToolCall::new("c", "calculator", args.as_object().unwrap().clone());
        assert_eq!(call.str_arg("expression"), Some("2+2"));
        assert_eq!(call.str_arg("n"), None);
    }

    #[test]
    fn synthesized_ids_are_unique() {
        let a = ToolCall::synthesize_id();
        let b = ToolCall::synthesize_id();
        assert!(a.starts_with("call_"));
        assert_ne!(a, b);
    }
}
