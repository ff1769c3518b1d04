//! The orchestration loop.

use std::sync::Arc;
use std::time::Instant;

use capstan_config::AgentConfig;
use capstan_core::error::{Error, SkillError, ToolError};
use capstan_core::knowledge::Retriever;
use capstan_core::memory::MemoryStore;
use capstan_core::message::{Message, ToolCall};
use capstan_core::provider::{CapabilityDeclaration, NormalizedResponse, Provider, ProviderRequest};
use capstan_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::builtins::{self, CONSULT_KNOWLEDGE_BASE, ENABLE_SKILL, LIST_SKILLS, RECALL, REMEMBER, SEARCH_SKILLS};
use crate::skills::{SkillController, not_found_notice};
use crate::state::ConversationState;
use crate::window::ContextWindow;

/// Default cap on round-trips per user turn.
pub const DEFAULT_MAX_ROUNDS: usize = 25;

/// Drives one conversation: window, request, dispatch, repeat.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    temperature: f32,

    max_tokens: Option<u32>,

    /// Primitive tools
    tools: Arc<ToolRegistry>,

    skills: SkillController,

    window: ContextWindow,

    memory: Option<Arc<dyn MemoryStore>>,

    retriever: Option<Arc<dyn Retriever>>,

    /// Round-trips allowed per turn; 0 is unlimited
    max_rounds: usize,

    /// Log every outgoing window at info level
    show_full_context: bool,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        skills: SkillController,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            skills,
            window: ContextWindow::default(),
            memory: None,
            retriever: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
            show_full_context: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Attach a long-term memory store; declares `remember` and `recall`.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Attach a retriever; declares `consult_knowledge_base`.
    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.window = ContextWindow::new(turns);
        self
    }

    pub fn with_full_context_logging(mut self, enabled: bool) -> Self {
        self.show_full_context = enabled;
        self
    }

    /// Apply the `[agent]` config section.
    pub fn with_agent_config(self, config: &AgentConfig) -> Self {
        self.with_history_turns(config.max_chat_history)
            .with_max_rounds(config.max_rounds)
            .with_full_context_logging(config.show_full_context)
    }

    pub fn skills(&self) -> &SkillController {
        &self.skills
    }

    pub fn memory(&self) -> Option<&Arc<dyn MemoryStore>> {
        self.memory.as_ref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Everything the model may call this round, in a stable order.
    pub fn declarations(&self) -> Vec<CapabilityDeclaration> {
        let mut declarations = self.tools.declarations();
        declarations.extend(builtins::skill_declarations());
        if self.memory.is_some() {
            declarations.extend(builtins::memory_declarations());
        }
        if self.retriever.is_some() {
            declarations.push(builtins::knowledge_declaration());
        }
        declarations
    }

    /// Run one user turn to its final answer.
    ///
    /// Backend failures end the turn with the user message already in
    /// history; every call batch that was appended is fully answered.
    pub async fn chat(&self, state: &mut ConversationState, input: &str) -> Result<String, Error> {
        state.append(Message::user(input))?;

        let declarations = self.declarations();
        let mut rounds = 0;

        loop {
            if self.max_rounds > 0 && rounds >= self.max_rounds {
                warn!(rounds, "Round limit reached without a final answer");
                return Err(Error::RoundLimitExceeded { rounds });
            }
            rounds += 1;

            let view = self.window.window_for(state.conversation());
            debug!(
                round = rounds,
                view = view.len(),
                history = state.messages().len(),
                "Agent loop round"
            );
            if self.show_full_context {
                let names: Vec<&str> = declarations.iter().map(|d| d.name.as_str()).collect();
                info!(
                    messages = view.len(),
                    total = state.messages().len(),
                    capabilities = ?names,
                    window = %serde_json::to_string_pretty(&view).unwrap_or_default(),
                    "Sending request"
                );
            }

            let mut request = ProviderRequest::new(self.model.clone(), view);
            request.capabilities = declarations.clone();
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;

            let response = self.provider.complete(request).await?;

            let calls = match response {
                NormalizedResponse::Final { text } => {
                    state.append(Message::assistant(text.clone()))?;
                    debug!(rounds, "Final response");
                    return Ok(text);
                }
                NormalizedResponse::Calls { text, calls } => {
                    state.append(Message::assistant_calls(text, calls.clone()))?;
                    calls
                }
            };

            debug!(count = calls.len(), "Dispatching calls");
            for call in &calls {
                let output = self.dispatch(state, call).await;
                state.append(Message::tool_result(call.id.clone(), output))?;
            }

            let flushed = state.flush_injections()?;
            if flushed > 0 {
                debug!(flushed, "Flushed skill injections");
            }
        }
    }

    /// Execute one call and render its outcome as the tool-result text.
    async fn dispatch(&self, state: &mut ConversationState, call: &ToolCall) -> String {
        let start = Instant::now();
        let outcome = match call.name.as_str() {
            LIST_SKILLS => self.list_skills(call),
            SEARCH_SKILLS => self.search_skills(call),
            ENABLE_SKILL => self.enable_skill(state, call),
            REMEMBER if self.memory.is_some() => self.remember(call).await,
            RECALL if self.memory.is_some() => self.recall(call).await,
            CONSULT_KNOWLEDGE_BASE if self.retriever.is_some() => self.consult(call).await,
            name if self.tools.contains(name) => self
                .tools
                .execute(name, serde_json::Value::Object(call.arguments.clone()))
                .await
                .map(|result| {
                    if !result.success {
                        debug!(tool = %name, "Tool reported failure");
                    }
                    result.output
                }),
            name => {
                warn!(tool = %name, "Model called an unknown tool");
                return format!("Error: Tool {name} not found.");
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(output) => {
                debug!(tool = %call.name, duration_ms, "Tool executed");
                output
            }
            Err(e) => {
                warn!(tool = %call.name, duration_ms, error = %e, "Tool execution failed");
                format!("Error executing tool {}: {e}", call.name)
            }
        }
    }

    fn list_skills(&self, call: &ToolCall) -> Result<String, ToolError> {
        let category = required_arg(call, "category")?;
        let skills = self
            .skills
            .list_in_category(category)
            .map_err(|e| skill_failure(call, e))?;
        Ok(builtins::render_skill_listing(&skills))
    }

    fn search_skills(&self, call: &ToolCall) -> Result<String, ToolError> {
        let query = required_arg(call, "query")?;
        let skills = self.skills.search(query).map_err(|e| skill_failure(call, e))?;
        Ok(builtins::render_skill_search(&skills))
    }

    fn enable_skill(&self, state: &mut ConversationState, call: &ToolCall) -> Result<String, ToolError> {
        let name = required_arg(call, "skill_name")?;
        match self.skills.enable(state, name) {
            Ok(notice) => Ok(notice),
            Err(SkillError::NotFound(name)) => Ok(not_found_notice(&name)),
            Err(e) => Err(skill_failure(call, e)),
        }
    }

    async fn remember(&self, call: &ToolCall) -> Result<String, ToolError> {
        let key = required_arg(call, "key")?;
        let content = required_arg(call, "content")?;
        let Some(memory) = &self.memory else {
            return Err(ToolError::NotFound(call.name.clone()));
        };
        memory
            .remember(key, content)
            .await
            .map_err(|e| failure(call, e))?;
        Ok(builtins::render_remembered(key, content))
    }

    async fn recall(&self, call: &ToolCall) -> Result<String, ToolError> {
        let query = required_arg(call, "query")?;
        let Some(memory) = &self.memory else {
            return Err(ToolError::NotFound(call.name.clone()));
        };
        let records = memory.recall(query).await.map_err(|e| failure(call, e))?;
        Ok(builtins::render_recall(&records))
    }

    async fn consult(&self, call: &ToolCall) -> Result<String, ToolError> {
        let query = required_arg(call, "query")?;
        let Some(retriever) = &self.retriever else {
            return Err(ToolError::NotFound(call.name.clone()));
        };
        let chunks = retriever.retrieve(query).await.map_err(|e| failure(call, e))?;
        Ok(builtins::render_knowledge(&chunks))
    }
}

fn required_arg<'a>(call: &'a ToolCall, key: &str) -> Result<&'a str, ToolError> {
    call.str_arg(key)
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

fn failure(call: &ToolCall, e: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: call.name.clone(),
        reason: e.to_string(),
    }
}

fn skill_failure(call: &ToolCall, e: SkillError) -> ToolError {
    failure(call, e)
}
