pub mod openai;
pub mod openai_compat;
pub mod speech;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::{OpenAiProvider, ProviderErrorKind};
pub use openai_compat::{custom, ollama, ollama_with_base, openrouter};
pub use speech::{OpenAiSpeechProvider, SpeechSynthesizer, StubSpeech};
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

// ============================================================
// Provider Configuration
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    OpenRouter,
    Ollama,
    /// Any other OpenAI-compatible endpoint
    Custom,
    /// Offline echo provider
    Stub,
}

/// Configuration for a single provider instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider ID (e.g., "openai", "local-ollama")
    pub id: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Overrides the default base URL of the provider type
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, provider_type: ProviderType) -> Self {
        Self {
            id: id.into(),
            provider_type,
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderType::OpenAI => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("openai requires api_key"))?;
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(openai_compat::OPENAI_BASE);
            Arc::new(OpenAiProvider::new(key.clone(), base_url))
        }
        ProviderType::OpenRouter => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("openrouter requires api_key"))?;
            match config.base_url.as_deref() {
                Some(base_url) => Arc::new(custom(key.clone(), base_url)),
                None => Arc::new(openrouter(key.clone())),
            }
        }
        ProviderType::Ollama => {
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(openai_compat::OLLAMA_BASE);
            Arc::new(ollama_with_base(base_url))
        }
        ProviderType::Custom => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("custom provider requires api_key"))?;
            let base_url = config
                .base_url
                .as_ref()
                .ok_or_else(|| anyhow!("custom provider requires base_url"))?;
            Arc::new(custom(key.clone(), base_url.clone()))
        }
        ProviderType::Stub => Arc::new(StubProvider),
    };
    Ok(provider)
}

pub fn register_from_configs(
    registry: &mut ProviderRegistry,
    configs: &[ProviderConfig],
) -> Result<()> {
    for config in configs {
        let provider = create_provider(config)?;
        registry.register(&config.id, provider);
        tracing::info!("Registered provider: {} ({:?})", config.id, config.provider_type);
    }
    Ok(())
}

// ============================================================
// Provider Registry
// ============================================================

#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(id.into(), provider);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn LlmProvider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("provider not found: {id}"))
    }

    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.text())
            .unwrap_or_default();
        Ok(LlmResponse::text_only(format!(
            "[stub:{}] {}",
            request.model, user_text
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_registry_get_registered_succeeds() {
        let mut registry = ProviderRegistry::new();
        registry.register("openai", Arc::new(StubProvider));

        let provider = registry.get("openai").unwrap();
        assert!(Arc::strong_count(&provider) >= 1);
        assert_eq!(registry.list(), vec!["openai"]);
    }

    #[test]
    fn provider_registry_get_unknown_fails() {
        let registry = ProviderRegistry::new();
        let err = registry.get("missing").err().unwrap();
        assert!(err.to_string().contains("provider not found: missing"));
    }

    #[tokio::test]
    async fn stub_provider_chat_echoes_last_message() {
        let req = LlmRequest::simple("my-model".into(), None, "ping".into());
        let resp = StubProvider.chat(req).await.unwrap();
        assert_eq!(resp.text, "[stub:my-model] ping");
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn create_provider_requires_key_for_openai() {
        let config = ProviderConfig::new("openai", ProviderType::OpenAI);
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("requires api_key"));
    }

    #[test]
    fn create_provider_custom_requires_base_url() {
        let config = ProviderConfig::new("mine", ProviderType::Custom).with_api_key("k");
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn register_from_configs_registers_all() {
        let configs = vec![
            ProviderConfig::new("local", ProviderType::Ollama),
            ProviderConfig::new("offline", ProviderType::Stub),
            ProviderConfig::new("openai", ProviderType::OpenAI).with_api_key("sk-test"),
        ];
        let mut registry = ProviderRegistry::new();
        register_from_configs(&mut registry, &configs).unwrap();
        let mut ids = registry.list();
        ids.sort();
        assert_eq!(ids, vec!["local", "offline", "openai"]);
    }

    #[test]
    fn provider_config_serde_uses_type_key() {
        let config = ProviderConfig::new("router", ProviderType::OpenRouter)
            .with_api_key("sk-or")
            .with_base_url("https://proxy.example.com/v1");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "openrouter");

        let back: ProviderConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.provider_type, ProviderType::OpenRouter);
        assert_eq!(back.base_url.as_deref(), Some("https://proxy.example.com/v1"));
    }
}
