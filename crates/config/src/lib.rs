//! Configuration loading, validation, and management for Capstan.
//!
//! Loads configuration from `./capstan.toml` or `~/.capstan/config.toml`
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory before the global config.
pub const PROJECT_CONFIG_FILE: &str = "capstan.toml";

/// Provider-specific API key variables, checked after `CAPSTAN_API_KEY`.
const PROVIDER_KEY_VARS: &[(&str, &str)] = &[
    ("deepseek", "DEEPSEEK_API_KEY"),
    ("grok", "GROK_API_KEY"),
    ("grok", "XAI_API_KEY"),
    ("openai", "OPENAI_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("gemini", "GEMINI_API_KEY"),
];

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Active LLM provider
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model override. When unset, the provider's default model is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Where skills, memory, knowledge and persona live
    #[serde(default)]
    pub context: ContextConfig,

    /// Primitive tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "deepseek".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("context", &self.context)
            .field("tools", &self.tools)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Number of user turns kept in the request window
    #[serde(default = "default_max_chat_history")]
    pub max_chat_history: usize,

    /// Round-trips allowed per user turn. 0 disables the cap.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Log every request window in full
    #[serde(default)]
    pub show_full_context: bool,
}

fn default_max_chat_history() -> usize {
    10
}
fn default_max_rounds() -> usize {
    25
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_chat_history: default_max_chat_history(),
            max_rounds: default_max_rounds(),
            show_full_context: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Skill roots, scanned in order
    #[serde(default = "default_skills_dirs")]
    pub skills_dirs: Vec<PathBuf>,

    /// JSON memory file. Defaults to `~/.capstan/memory.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_path: Option<PathBuf>,

    /// Directory of `.txt` files for `consult_knowledge_base`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_path: Option<PathBuf>,

    /// Persona file, or directory of `.md`/`.txt` persona files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_path: Option<PathBuf>,
}

fn default_skills_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("context/skills")]
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            skills_dirs: default_skills_dirs(),
            memory_path: None,
            knowledge_path: None,
            persona_path: None,
        }
    }
}

impl ContextConfig {
    /// Layout produced by `capstan init` under `root`.
    pub fn scaffolded(root: &Path) -> Self {
        let context = root.join("context");
        Self {
            skills_dirs: vec![context.join("skills")],
            memory_path: Some(context.join("memory").join("memory.json")),
            knowledge_path: Some(context.join("knowledge")),
            persona_path: Some(context.join("persona")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Wall-clock limit for `run_command`
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// First-word allowlist for `run_command`. Empty allows everything.
    #[serde(default)]
    pub allowed_commands: Vec<String>,
}

fn default_command_timeout() -> u64 {
    60
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout(),
            allowed_commands: vec![],
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// Map provider aliases onto the names used for keys and routing.
pub fn canonical_provider_name(name: &str) -> String {
    match name.trim().to_lowercase().as_str() {
        "claude" => "anthropic".into(),
        "xai" => "grok".into(),
        "google" => "gemini".into(),
        other => other.into(),
    }
}

impl AppConfig {
    /// Load configuration from `explicit`, else `./capstan.toml`, else
    /// `~/.capstan/config.toml`, then apply environment overrides.
    ///
    /// Environment variables:
    /// - `CAPSTAN_PROVIDER` (or `LLM_PROVIDER`), `CAPSTAN_MODEL`
    /// - `CAPSTAN_API_KEY`, then `DEEPSEEK_API_KEY`, `GROK_API_KEY`,
    ///   `XAI_API_KEY`, `OPENAI_API_KEY`, `OPENROUTER_API_KEY`,
    ///   `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`
    /// - `CAPSTAN_MEMORY_PATH`
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let local = PathBuf::from(PROJECT_CONFIG_FILE);
                if local.exists() {
                    local
                } else {
                    Self::config_dir().join("config.toml")
                }
            }
        };
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), provider = %config.provider, "Loaded config");
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("CAPSTAN_PROVIDER").or_else(|| lookup("LLM_PROVIDER")) {
            self.provider = provider;
        }
        self.provider = canonical_provider_name(&self.provider);

        if let Some(model) = lookup("CAPSTAN_MODEL") {
            self.model = Some(model);
        }

        if self.api_key.is_none() {
            self.api_key = lookup("CAPSTAN_API_KEY");
        }

        for (provider, var) in PROVIDER_KEY_VARS {
            if let Some(key) = lookup(var) {
                let entry = self.providers.entry((*provider).to_string()).or_default();
                if entry.api_key.is_none() {
                    entry.api_key = Some(key);
                }
            }
        }

        if let Some(path) = lookup("CAPSTAN_MEMORY_PATH") {
            self.context.memory_path = Some(PathBuf::from(path));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".capstan")
    }

    /// Memory file in use: the configured one or `~/.capstan/memory.json`.
    pub fn memory_path(&self) -> PathBuf {
        self.context
            .memory_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("memory.json"))
    }

    /// Settings block for the active provider, if any.
    pub fn active_provider(&self) -> Option<&ProviderConfig> {
        self.providers.get(&canonical_provider_name(&self.provider))
    }

    /// Key for the active provider: its own block first, then the global key.
    pub fn active_api_key(&self) -> Option<String> {
        self.active_provider()
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_chat_history == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_chat_history must be at least 1".into(),
            ));
        }

        if self.tools.command_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.command_timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a config TOML string (for `init`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// The default configuration as TOML.
    pub fn default_toml() -> Result<String, ConfigError> {
        Self::default().to_toml()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            context: ContextConfig::default(),
            tools: ToolsConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to render config: {0}")]
    SerializeError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "deepseek");
        assert_eq!(config.agent.max_chat_history, 10);
        assert_eq!(config.agent.max_rounds, 25);
        assert_eq!(config.tools.command_timeout_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let mut config = AppConfig::default();
        config.context = ContextConfig::scaffolded(Path::new("/srv/app"));
        let toml_str = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider, config.provider);
        assert_eq!(
            parsed.context.knowledge_path,
            Some(PathBuf::from("/srv/app/context/knowledge"))
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
provider = "gemini"

[agent]
max_chat_history = 4

[providers.gemini]
default_model = "gemini-2.0-flash"
"#,
        )
        .unwrap();
        assert_eq!(config.agent.max_chat_history, 4);
        assert_eq!(config.agent.max_rounds, 25);
        assert_eq!(
            config.active_provider().and_then(|p| p.default_model.clone()),
            Some("gemini-2.0-flash".into())
        );
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_history_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_chat_history = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider, "deepseek");
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = \"anthropic\"\ntemperature = 0.2\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.provider, "anthropic");
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_provider_and_keys() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("LLM_PROVIDER", "Claude"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("CAPSTAN_MODEL", "claude-3-5-haiku-latest"),
            ("CAPSTAN_MEMORY_PATH", "/tmp/mem.json"),
        ]));
        assert_eq!(config.provider, "anthropic");
        assert_eq!(config.model.as_deref(), Some("claude-3-5-haiku-latest"));
        assert_eq!(config.active_api_key().as_deref(), Some("sk-ant"));
        assert_eq!(config.memory_path(), PathBuf::from("/tmp/mem.json"));
    }

    #[test]
    fn capstan_provider_wins_over_llm_provider() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("CAPSTAN_PROVIDER", "gemini"), ("LLM_PROVIDER", "grok")]));
        assert_eq!(config.provider, "gemini");
    }

    #[test]
    fn file_key_is_not_overwritten_by_env() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "deepseek".into(),
            ProviderConfig {
                api_key: Some("from-file".into()),
                ..Default::default()
            },
        );
        config.apply_env(env(&[("DEEPSEEK_API_KEY", "from-env")]));
        assert_eq!(config.active_api_key().as_deref(), Some("from-file"));
    }

    #[test]
    fn global_key_is_the_fallback() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("CAPSTAN_API_KEY", "global")]));
        assert_eq!(config.active_api_key().as_deref(), Some("global"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            api_key: Some("super-secret".into()),
            ..AppConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml().unwrap();
        assert!(toml_str.contains("deepseek"));
        assert!(toml_str.contains("max_rounds"));
    }
}
