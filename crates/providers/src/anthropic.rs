//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! - `x-api-key` header authentication (not Bearer)
//! - System prompt as the top-level `system` field
//! - Calls as `tool_use` blocks; results as `tool_result` blocks in a user
//!   turn, with consecutive results merged into one turn
//! - The first turn must come from the user

use async_trait::async_trait;
use capstan_core::message::{Message, Role, ToolCall};
use capstan_core::provider::{CapabilityDeclaration, NormalizedResponse, ProviderRequest};
use capstan_core::{ProtocolViolation, ProviderError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{EMPTY_ASSISTANT_TURN, SYNTHETIC_USER_TURN};
use crate::http::{build_client, classify_reqwest_error, object_arguments, read_json};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client(REQUEST_TIMEOUT_SECS)?,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert the non-system part of the view to Anthropic turns.
    fn to_api_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {}
                Role::User => result.push(AnthropicMessage {
                    role: "user".into(),
                    content: AnthropicContent::Text(msg.text().to_string()),
                }),
                Role::Assistant if msg.calls.is_empty() => {
                    let text = match msg.text() {
                        t if t.trim().is_empty() => EMPTY_ASSISTANT_TURN,
                        t => t,
                    };
                    result.push(AnthropicMessage {
                        role: "assistant".into(),
                        content: AnthropicContent::Text(text.to_string()),
                    })
                }
                Role::Assistant => {
                    let mut blocks = Vec::with_capacity(msg.calls.len() + 1);
                    if let Some(text) = msg.content.as_deref().filter(|t| !t.is_empty()) {
                        blocks.push(ContentBlock::Text { text: text.into() });
                    }
                    for tc in &msg.calls {
                        blocks.push(ContentBlock::ToolUse {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            input: serde_json::Value::Object(tc.arguments.clone()),
                        });
                    }
                    result.push(AnthropicMessage {
                        role: "assistant".into(),
                        content: AnthropicContent::Blocks(blocks),
                    });
                }
                Role::Tool => {
                    let block = ContentBlock::ToolResult {
                        tool_use_id: msg.call_id.clone().unwrap_or_default(),
                        content: msg.text().to_string(),
                    };
                    match result.last_mut() {
                        Some(AnthropicMessage {
                            role,
                            content: AnthropicContent::Blocks(blocks),
                        }) if *role == "user"
                            && blocks
                                .iter()
                                .all(|b| matches!(b, ContentBlock::ToolResult { .. })) =>
                        {
                            blocks.push(block);
                        }
                        _ => result.push(AnthropicMessage {
                            role: "user".into(),
                            content: AnthropicContent::Blocks(vec![block]),
                        }),
                    }
                }
            }
        }

        if result.first().is_some_and(|m| m.role != "user") {
            result.insert(
                0,
                AnthropicMessage {
                    role: "user".into(),
                    content: AnthropicContent::Text(SYNTHETIC_USER_TURN.into()),
                },
            );
        }

        result
    }

    /// Convert declarations to Anthropic format.
    fn to_api_tools(capabilities: &[CapabilityDeclaration]) -> Vec<AnthropicTool> {
        capabilities
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn parse_response(resp: AnthropicResponse) -> Result<NormalizedResponse, ProviderError> {
        let mut text = String::new();
        let mut calls = Vec::new();

        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text: t } => text.push_str(&t),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    let arguments = object_arguments(&name, input)?;
                    if id.is_empty() {
                        return Err(ProtocolViolation::Malformed(format!(
                            "tool_use block for '{name}' has no id"
                        ))
                        .into());
                    }
                    calls.push(ToolCall::new(id, name, arguments));
                }
                ResponseContentBlock::Other => {}
            }
        }

        Ok(NormalizedResponse::from_parts(Some(text), calls))
    }
}

#[async_trait]
impl capstan_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<NormalizedResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
        });

        if let Some(system) = request.folded_system_prompt() {
            body["system"] = serde_json::json!(system);
        }

        if !request.capabilities.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.capabilities));
        }

        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let api_resp: AnthropicResponse = read_json("anthropic", response).await?;
        Self::parse_response(api_resp)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}
