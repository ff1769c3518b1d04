//! Provider selection: builds the single active backend from config.

use std::sync::Arc;

use capstan_config::{AppConfig, canonical_provider_name};
use capstan_core::ProviderError;
use capstan_core::provider::Provider;
use tracing::info;

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// The provider a session talks to, with the model it should request.
#[derive(Clone)]
pub struct ActiveProvider {
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

impl std::fmt::Debug for ActiveProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveProvider")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Build the active provider from configuration.
///
/// Known names get their documented endpoint and default model. Any other
/// name is accepted as an OpenAI-compatible endpoint when
/// `providers.<name>.api_url` is set.
pub fn build_from_config(config: &AppConfig) -> Result<ActiveProvider, ProviderError> {
    let name = canonical_provider_name(&config.provider);
    let provider_config = config.active_provider();

    let model = config
        .model
        .clone()
        .or_else(|| provider_config.and_then(|p| p.default_model.clone()))
        .or_else(|| default_model(&name).map(String::from))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!("no model configured for provider '{name}'"))
        })?;

    let api_url = provider_config.and_then(|p| p.api_url.clone());
    let api_key = match (config.active_api_key(), name.as_str()) {
        (Some(key), _) => key,
        (None, "ollama") => "ollama".into(),
        (None, _) => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{name}' (set {} or providers.{name}.api_key)",
                key_hint(&name)
            )));
        }
    };

    let provider: Arc<dyn Provider> = match name.as_str() {
        "anthropic" => {
            let mut p = AnthropicProvider::new(api_key)?;
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        "gemini" => {
            let mut p = GeminiProvider::new(api_key)?;
            if let Some(url) = api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        other => {
            let base_url = api_url
                .or_else(|| default_base_url(other).map(String::from))
                .ok_or_else(|| {
                    ProviderError::NotConfigured(format!(
                        "unknown provider '{other}' (set providers.{other}.api_url to use a custom endpoint)"
                    ))
                })?;
            Arc::new(OpenAiCompatProvider::new(other, base_url, api_key)?)
        }
    };

    info!(provider = %name, model = %model, "Provider ready");
    Ok(ActiveProvider { provider, model })
}

/// Get the default base URL for well-known OpenAI-compatible providers.
pub fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "grok" => Some("https://api.x.ai/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

/// Model used when neither the config nor the provider block names one.
pub fn default_model(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("gpt-4o-mini"),
        "deepseek" => Some("deepseek-chat"),
        "grok" => Some("grok-beta"),
        "openrouter" => Some("anthropic/claude-sonnet-4"),
        "ollama" => Some("llama3.1"),
        "anthropic" => Some("claude-3-5-sonnet-20241022"),
        "gemini" => Some("gemini-2.0-flash-exp"),
        _ => None,
    }
}

fn key_hint(provider_name: &str) -> String {
    format!("{}_API_KEY", provider_name.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan_config::ProviderConfig;

    fn config_for(provider: &str, key: Option<&str>) -> AppConfig {
        let mut config = AppConfig {
            provider: provider.into(),
            ..AppConfig::default()
        };
        if let Some(key) = key {
            config.providers.insert(
                canonical_provider_name(provider),
                ProviderConfig {
                    api_key: Some(key.into()),
                    ..Default::default()
                },
            );
        }
        config
    }

    #[test]
    fn deepseek_is_the_default_route() {
        let active = build_from_config(&config_for("deepseek", Some("sk"))).unwrap();
        assert_eq!(active.provider.name(), "deepseek");
        assert_eq!(active.model, "deepseek-chat");
    }

    #[test]
    fn native_adapters_are_selected() {
        let active = build_from_config(&config_for("claude", Some("sk-ant"))).unwrap();
        assert_eq!(active.provider.name(), "anthropic");
        assert_eq!(active.model, "claude-3-5-sonnet-20241022");

        let active = build_from_config(&config_for("gemini", Some("g"))).unwrap();
        assert_eq!(active.provider.name(), "gemini");
        assert_eq!(active.model, "gemini-2.0-flash-exp");
    }

    #[test]
    fn model_override_wins() {
        let mut config = config_for("grok", Some("xai"));
        config.model = Some("grok-2".into());
        let active = build_from_config(&config).unwrap();
        assert_eq!(active.provider.name(), "grok");
        assert_eq!(active.model, "grok-2");
    }

    #[test]
    fn missing_key_is_not_configured() {
        let err = build_from_config(&config_for("anthropic", None)).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn ollama_needs_no_key() {
        let active = build_from_config(&config_for("ollama", None)).unwrap();
        assert_eq!(active.provider.name(), "ollama");
    }

    #[test]
    fn unknown_provider_needs_an_endpoint() {
        let err = build_from_config(&config_for("mystery", Some("k"))).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));

        let mut config = config_for("mystery", Some("k"));
        if let Some(p) = config.providers.get_mut("mystery") {
            p.api_url = Some("http://localhost:9000/v1".into());
            p.default_model = Some("local-model".into());
        }
        let active = build_from_config(&config).unwrap();
        assert_eq!(active.provider.name(), "mystery");
        assert_eq!(active.model, "local-model");
    }
}
