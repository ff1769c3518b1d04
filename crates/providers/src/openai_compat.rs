//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, DeepSeek, Grok (xAI), OpenRouter, Ollama, and any
//! endpoint exposing `/chat/completions` with function calling.
//!
//! - All system messages fold into one leading `system` message.
//! - Tool results are sent as `role: tool` with `tool_call_id`.
//! - Call arguments travel as JSON strings and are decoded on the way back.

use async_trait::async_trait;
use capstan_core::message::{Message, Role, ToolCall};
use capstan_core::provider::{CapabilityDeclaration, NormalizedResponse, ProviderRequest};
use capstan_core::{ProtocolViolation, ProviderError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{build_client, classify_reqwest_error, decode_arguments, read_json};

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: build_client(REQUEST_TIMEOUT_SECS)?,
        })
    }

    /// Convert the canonical view to OpenAI API messages.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        let mut result = Vec::with_capacity(messages.len());

        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text())
            .collect();
        if !system.is_empty() {
            result.push(ApiMessage {
                role: "system".into(),
                content: Some(system.join("\n")),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        for m in messages.iter().filter(|m| m.role != Role::System) {
            let tool_calls = if m.calls.is_empty() {
                None
            } else {
                Some(
                    m.calls
                        .iter()
                        .map(|tc| ApiToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: serde_json::Value::Object(tc.arguments.clone())
                                    .to_string(),
                            },
                        })
                        .collect(),
                )
            };
            result.push(ApiMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
                tool_calls,
                tool_call_id: m.call_id.clone(),
            });
        }

        result
    }

    /// Convert declarations to OpenAI `tools[].function` entries.
    fn to_api_tools(capabilities: &[CapabilityDeclaration]) -> Vec<ApiToolDefinition> {
        capabilities
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn parse_response(resp: ApiResponse) -> Result<NormalizedResponse, ProviderError> {
        let choice = resp.choices.into_iter().next().ok_or_else(|| {
            ProtocolViolation::Malformed("no choices in chat completion response".into())
        })?;

        let mut calls = Vec::new();
        for tc in choice.message.tool_calls.unwrap_or_default() {
            let arguments =
                decode_arguments(&tc.function.name, tc.function.arguments.as_deref().unwrap_or(""))?;
            let id = tc
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(ToolCall::synthesize_id);
            calls.push(ToolCall::new(id, tc.function.name, arguments));
        }

        Ok(NormalizedResponse::from_parts(choice.message.content, calls))
    }
}

#[async_trait]
impl capstan_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<NormalizedResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.capabilities.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.capabilities));
            body["tool_choice"] = serde_json::json!("auto");
        }

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let api_response: ApiResponse = read_json(&self.name, response).await?;
        Self::parse_response(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ApiResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ApiResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}
