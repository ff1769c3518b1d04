//! `capstan chat`: interactive or single-message chat mode.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use capstan_agent::{AgentLoop, ConversationState, SkillController, SystemPromptBuilder, load_persona};
use capstan_config::AppConfig;
use capstan_memory::{JsonFileMemory, KeywordRetriever};
use capstan_skills::DirectorySkillStore;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// An agent plus the state of the one session it serves.
pub struct Session {
    pub agent: AgentLoop,
    pub state: ConversationState,
    pub provider_name: String,
    pub model: String,
}

/// Wire the provider, tools, skills, memory and knowledge from `config`.
pub fn build_session(config: &AppConfig) -> anyhow::Result<Session> {
    let active = capstan_providers::build_from_config(config).with_context(|| {
        format!(
            "Provider '{}' is not usable. Set CAPSTAN_API_KEY or the provider's key variable, \
             or add api_key to {}",
            config.provider,
            AppConfig::config_dir().join("config.toml").display()
        )
    })?;

    let tools = Arc::new(capstan_tools::default_registry(&config.tools));
    let skills = SkillController::new(Arc::new(DirectorySkillStore::new(
        config.context.skills_dirs.clone(),
    )));

    let categories = match skills.list_categories() {
        Ok(categories) => categories,
        Err(e) => {
            warn!(error = %e, "Could not list skill categories");
            Vec::new()
        }
    };

    let memory = Arc::new(JsonFileMemory::open(config.memory_path()));

    let retriever = config
        .context
        .knowledge_path
        .as_deref()
        .filter(|p| p.is_dir())
        .map(KeywordRetriever::load)
        .filter(|r| !r.is_empty());

    let persona = config
        .context
        .persona_path
        .as_deref()
        .map(load_persona)
        .unwrap_or_default();

    let prompt = SystemPromptBuilder::new(categories)
        .persona(persona)
        .primitives(tools.names())
        .memory(true)
        .knowledge(retriever.is_some())
        .build();
    debug!(chars = prompt.len(), "System prompt assembled");

    let mut agent = AgentLoop::new(active.provider, active.model.clone(), tools, skills)
        .with_agent_config(&config.agent)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_memory(memory);
    if let Some(retriever) = retriever {
        debug!(chunks = retriever.len(), "Knowledge base loaded");
        agent = agent.with_retriever(Arc::new(retriever));
    }

    Ok(Session {
        agent,
        state: ConversationState::with_system_prompt(prompt),
        provider_name: config.provider.clone(),
        model: active.model,
    })
}

fn is_exit(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "exit" | "quit")
}

pub async fn run(config_path: Option<&Path>, message: Option<String>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let mut session = build_session(&config)?;

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let response = session.agent.chat(&mut session.state, &msg).await;
        eprint!("\r              \r");
        println!("{}", response?);
        return Ok(());
    }

    println!();
    println!("  Capstan: interactive mode");
    println!();
    println!("  Provider:  {}", session.provider_name);
    println!("  Model:     {}", session.model);
    println!("  Tools:     {}", session.agent.tools().names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or 'quit' to leave.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if is_exit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        eprint!("  ...");
        match session.agent.chat(&mut session.state, &line).await {
            Ok(response) => {
                eprint!("\r     \r");
                println!();
                for line in response.lines() {
                    println!("  Capstan > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  Error: {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
