//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider takes one bounded view of the conversation plus the capability
//! declarations currently on offer, performs a single round-trip against its
//! backend, and hands back a [`NormalizedResponse`].
//!
//! Implementations: OpenAI-compatible, Anthropic, Gemini.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "deepseek-chat", "claude-3-5-sonnet-20241022")
    pub model: String,

    /// The windowed conversation view
    pub messages: Vec<Message>,

    /// Capabilities the model may call, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<CapabilityDeclaration>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            capabilities: Vec::new(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    /// All system messages, newline-joined in view order. `None` if there are none.
    pub fn folded_system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == crate::message::Role::System)
            .map(|m| m.text())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// A capability declaration sent to the LLM so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDeclaration {
    pub name: String,

    pub description: String,

    /// JSON Schema (object with properties) describing the arguments
    pub parameters: serde_json::Value,
}

impl CapabilityDeclaration {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// What one round-trip produced, independent of backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedResponse {
    /// The model answered; the turn is over.
    Final { text: String },

    /// The model wants these calls executed, in order.
    Calls {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
}

impl NormalizedResponse {
    /// Pick the variant from decoded parts. Blank text becomes absent.
    pub fn from_parts(text: Option<String>, calls: Vec<ToolCall>) -> Self {
        let text = text.filter(|t| !t.is_empty());
        if calls.is_empty() {
            NormalizedResponse::Final {
                text: text.unwrap_or_default(),
            }
        } else {
            NormalizedResponse::Calls { text, calls }
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            NormalizedResponse::Final { text } => Some(text),
            NormalizedResponse::Calls { text, .. } => text.as_deref(),
        }
    }

    pub fn calls(&self) -> &[ToolCall] {
        match self {
            NormalizedResponse::Final { .. } => &[],
            NormalizedResponse::Calls { calls, .. } => calls,
        }
    }

    /// The assistant message to append to history.
    pub fn into_message(self) -> Message {
        match self {
            NormalizedResponse::Final { text } => Message::assistant(text),
            NormalizedResponse::Calls { text, calls } => Message::assistant_calls(text, calls),
        }
    }
}

/// The core Provider trait.
///
/// The orchestration loop calls `complete()` without knowing which backend is
/// behind it. Adapters never retry; every failure propagates to the caller.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "deepseek", "anthropic").
    fn name(&self) -> &str;

    /// Send one request and get a normalized response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<NormalizedResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("deepseek-chat", vec![]);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.capabilities.is_empty());
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn system_prompts_fold_in_order() {
        let req = ProviderRequest::new(
            "m",
            vec![
                Message::system("first"),
                Message::user("hi"),
                Message::system("second"),
            ],
        );
        assert_eq!(req.folded_system_prompt().as_deref(), Some("first\nsecond"));
        assert!(ProviderRequest::new("m", vec![Message::user("x")])
            .folded_system_prompt()
            .is_none());
    }

    #[test]
    fn declaration_serialization() {
        let decl = CapabilityDeclaration::new(
            "run_command",
            "Execute a shell command",
            json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command to run" }
                },
                "required": ["command"]
            }),
        );
        let json = serde_json::to_string(&decl).unwrap();
        assert!(json.contains("run_command"));
        assert!(json.contains("command"));
    }

    #[test]
    fn from_parts_picks_variant() {
        assert_eq!(
            NormalizedResponse::from_parts(Some("4".into()), vec![]),
            NormalizedResponse::Final { text: "4".into() }
        );
        let calls = vec![ToolCall::new("c1", "calculator", serde_json::Map::new())];
        let resp = NormalizedResponse::from_parts(Some(String::new()), calls.clone());
        assert_eq!(resp, NormalizedResponse::Calls { text: None, calls });
    }

    #[test]
    fn into_message_keeps_calls() {
        let calls = vec![ToolCall::new("c1", "calculator", serde_json::Map::new())];
        let msg = NormalizedResponse::Calls {
            text: Some("working".into()),
            calls,
        }
        .into_message();
        assert_eq!(msg.calls.len(), 1);
        assert_eq!(msg.text(), "working");
    }

    #[test]
    fn response_is_tagged_on_the_wire() {
        let v = serde_json::to_value(NormalizedResponse::Final { text: "hi".into() }).unwrap();
        assert_eq!(v, json!({"kind": "final", "text": "hi"}));
    }
}
