//! Google Gemini provider implementation (`generateContent`).
//!
//! - System messages fold into `system_instruction`
//! - Assistant turns use role `model` with `functionCall` parts
//! - Tool results become `functionResponse` parts in a user turn. Gemini keys
//!   them by function *name*, so each result's name is recovered by scanning
//!   back through the view for the call that produced it.
//! - Gemini never returns call ids; they are synthesized per response.

use async_trait::async_trait;
use capstan_core::message::{Message, Role, ToolCall};
use capstan_core::provider::{CapabilityDeclaration, NormalizedResponse, ProviderRequest};
use capstan_core::{ProtocolViolation, ProviderError};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{EMPTY_ASSISTANT_TURN, SYNTHETIC_USER_TURN};
use crate::http::{build_client, classify_reqwest_error, object_arguments, read_json};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// JSON Schema keys Gemini function declarations reject.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["additionalProperties", "$schema"];

pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
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

    /// Build the `contents` array from the non-system part of the view.
    fn build_contents(messages: &[Message]) -> Result<Vec<Value>, ProviderError> {
        let mut contents: Vec<Value> = Vec::new();
        // Index into `contents` of the user turn collecting consecutive results.
        let mut open_results: Option<usize> = None;

        for (idx, msg) in messages.iter().enumerate() {
            match msg.role {
                Role::System => continue,
                Role::User => {
                    contents.push(json!({"role": "user", "parts": [{"text": msg.text()}]}));
                }
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if let Some(text) = msg.content.as_deref().filter(|t| !t.trim().is_empty()) {
                        parts.push(json!({"text": text}));
                    }
                    for tc in &msg.calls {
                        parts.push(json!({
                            "functionCall": {"name": tc.name, "args": Value::Object(tc.arguments.clone())}
                        }));
                    }
                    if parts.is_empty() {
                        parts.push(json!({"text": EMPTY_ASSISTANT_TURN}));
                    }
                    contents.push(json!({"role": "model", "parts": parts}));
                }
                Role::Tool => {
                    let call_id = msg.call_id.as_deref().unwrap_or_default();
                    let name = resolve_call_name(&messages[..idx], call_id)?;
                    let part = json!({
                        "functionResponse": {"name": name, "response": response_payload(msg.text())}
                    });
                    match open_results {
                        Some(i) => {
                            if let Some(parts) = contents[i]["parts"].as_array_mut() {
                                parts.push(part);
                            }
                        }
                        None => {
                            contents.push(json!({"role": "user", "parts": [part]}));
                            open_results = Some(contents.len() - 1);
                        }
                    }
                    continue;
                }
            }
            open_results = None;
        }

        if contents.first().is_some_and(|c| c["role"] != "user") {
            contents.insert(0, json!({"role": "user", "parts": [{"text": SYNTHETIC_USER_TURN}]}));
        }

        Ok(contents)
    }

    /// Build the `tools` array, stripping schema keys Gemini can't express.
    fn build_tools(capabilities: &[CapabilityDeclaration]) -> Value {
        let declarations: Vec<Value> = capabilities
            .iter()
            .map(|c| {
                let mut removed = Vec::new();
                let parameters = sanitize_schema(&c.parameters, &mut removed);
                if !removed.is_empty() {
                    removed.sort();
                    removed.dedup();
                    warn!(
                        capability = %c.name,
                        removed = ?removed,
                        "Dropped schema fields unsupported by Gemini"
                    );
                }
                json!({
                    "name": c.name,
                    "description": c.description,
                    "parameters": parameters,
                })
            })
            .collect();
        json!([{"function_declarations": declarations}])
    }

    fn parse_response(resp: GeminiResponse) -> Result<NormalizedResponse, ProviderError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolViolation::Malformed("no candidates in Gemini response".into()))?;

        let content = candidate.content.ok_or_else(|| {
            ProtocolViolation::Malformed(format!(
                "Gemini candidate has no content (finishReason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;

        let mut text = String::new();
        let mut calls = Vec::new();
        for part in content.parts {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(fc) = part.function_call {
                let arguments = object_arguments(&fc.name, fc.args)?;
                calls.push(ToolCall::new(ToolCall::synthesize_id(), fc.name, arguments));
            }
        }

        Ok(NormalizedResponse::from_parts(Some(text), calls))
    }
}

/// Find the name of the call `call_id` by scanning `preceding` backwards.
fn resolve_call_name<'a>(preceding: &'a [Message], call_id: &str) -> Result<&'a str, ProtocolViolation> {
    preceding
        .iter()
        .rev()
        .filter(|m| m.role == Role::Assistant)
        .flat_map(|m| m.calls.iter())
        .find(|c| c.id == call_id)
        .map(|c| c.name.as_str())
        .ok_or_else(|| ProtocolViolation::UnknownCallName {
            call_id: call_id.to_string(),
        })
}

/// Results that are JSON objects go through as-is; anything else is wrapped.
fn response_payload(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(v @ Value::Object(_)) => v,
        _ => json!({"result": text}),
    }
}

fn sanitize_schema(schema: &Value, removed: &mut Vec<String>) -> Value {
    match schema {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                if UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()) {
                    removed.push(key.clone());
                    continue;
                }
                sanitized.insert(key.clone(), sanitize_schema(value, removed));
            }
            Value::Object(sanitized)
        }
        Value::Array(values) => Value::Array(values.iter().map(|v| sanitize_schema(v, removed)).collect()),
        _ => schema.clone(),
    }
}

#[async_trait]
impl capstan_core::Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<NormalizedResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        let mut generation_config = json!({"temperature": request.temperature});
        if let Some(max_tokens) = request.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }

        let mut body = json!({
            "contents": Self::build_contents(&request.messages)?,
            "generationConfig": generation_config,
        });

        if let Some(system) = request.folded_system_prompt() {
            body["system_instruction"] = json!({"parts": [{"text": system}]});
        }

        if !request.capabilities.is_empty() {
            body["tools"] = Self::build_tools(&request.capabilities);
        }

        debug!(provider = "gemini", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let api_resp: GeminiResponse = read_json("gemini", response).await?;
        Self::parse_response(api_resp)
    }
}

// --- Gemini API types ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}
