use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use papercast_provider::{
    register_from_configs, LlmMessage, LlmRequest, LlmResponse, ProviderRegistry,
};
use tokio::time;

use crate::config::{parse_model_ref, PapercastConfig};

const MAX_RETRIES: usize = 2;
const BASE_BACKOFF_MS: u64 = 1000;
const MAX_TOKENS: u32 = 4096;

/// `complete(system, input, model) -> text`, the only model surface the
/// pipeline and the optimizer depend on.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, input: &str, model: &str) -> Result<String>;

    /// Same call with an explicit sampling temperature. Implementations that
    /// cannot honor it fall back to `complete`.
    async fn complete_at(
        &self,
        system: &str,
        input: &str,
        model: &str,
        _temperature: f32,
    ) -> Result<String> {
        self.complete(system, input, model).await
    }
}

pub struct LlmRouter {
    registry: ProviderRegistry,
    base_backoff: Duration,
}

impl LlmRouter {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            base_backoff: Duration::from_millis(BASE_BACKOFF_MS),
        }
    }

    pub fn from_config(config: &PapercastConfig) -> Result<Self> {
        let mut registry = ProviderRegistry::new();
        register_from_configs(&mut registry, &config.provider_configs())?;
        Ok(Self::new(registry))
    }

    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.base_backoff = base;
        self
    }

    /// Sends one request to the provider behind `model_ref`, retrying
    /// `[retryable]` failures with exponential backoff.
    pub async fn chat(
        &self,
        model_ref: &str,
        system: Option<String>,
        messages: Vec<LlmMessage>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let (provider_id, model_id) = parse_model_ref(model_ref)?;
        let provider = self.registry.get(provider_id)?;

        let mut attempts = 0;
        loop {
            let req = LlmRequest {
                model: model_id.to_string(),
                system: system.clone(),
                messages: messages.clone(),
                max_tokens: MAX_TOKENS,
                temperature,
            };

            match provider.chat(req).await {
                Ok(resp) => {
                    tracing::debug!(
                        provider = provider_id,
                        model = model_id,
                        input_tokens = ?resp.input_tokens,
                        output_tokens = ?resp.output_tokens,
                        "model call complete"
                    );
                    return Ok(resp);
                }
                Err(err) => {
                    let err_str = err.to_string();
                    let is_retryable = err_str.contains("[retryable]");
                    if is_retryable && attempts < MAX_RETRIES {
                        attempts += 1;
                        let backoff = self.base_backoff * (1 << (attempts - 1));
                        tracing::warn!(
                            "provider {provider_id} retryable error (attempt {attempts}/{MAX_RETRIES}), backing off {}ms: {err_str}",
                            backoff.as_millis()
                        );
                        time::sleep(backoff).await;
                        continue;
                    }

                    tracing::warn!(
                        "provider {provider_id} failed (retryable={is_retryable}, attempts={attempts}): {err_str}"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn complete_inner(
        &self,
        system: &str,
        input: &str,
        model: &str,
        temperature: Option<f32>,
    ) -> Result<String> {
        let resp = self
            .chat(
                model,
                Some(system.to_string()),
                vec![LlmMessage::user(input)],
                temperature,
            )
            .await?;
        if resp.text.trim().is_empty() {
            return Err(anyhow!("model {model} returned an empty completion"));
        }
        Ok(resp.text)
    }
}

#[async_trait]
impl LanguageModel for LlmRouter {
    async fn complete(&self, system: &str, input: &str, model: &str) -> Result<String> {
        self.complete_inner(system, input, model, None).await
    }

    async fn complete_at(
        &self,
        system: &str,
        input: &str,
        model: &str,
        temperature: f32,
    ) -> Result<String> {
        self.complete_inner(system, input, model, Some(temperature))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use papercast_provider::{LlmProvider, LlmRequest, LlmResponse, ProviderRegistry};

    use super::{LanguageModel, LlmRouter};

    struct RetryableFailProvider {
        call_count: AtomicUsize,
        fail_times: usize,
    }

    #[async_trait]
    impl LlmProvider for RetryableFailProvider {
        async fn chat(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
            let count = self.call_count.fetch_add(1, Ordering::SeqCst);
            if count < self.fail_times {
                anyhow::bail!("openai api error (429) [retryable]: rate limited")
            }
            Ok(LlmResponse::text_only(format!("ok after {count} retries")))
        }
    }

    struct PermanentFailProvider {
        call_count: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for PermanentFailProvider {
        async fn chat(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("openai api error (401): unauthorized")
        }
    }

    #[derive(Default)]
    struct RecordingProvider {
        seen: Mutex<Vec<LlmRequest>>,
        reply: String,
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        async fn chat(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(LlmResponse::text_only(self.reply.clone()))
        }
    }

    fn router_with(id: &str, provider: Arc<dyn LlmProvider>) -> LlmRouter {
        let mut registry = ProviderRegistry::new();
        registry.register(id, provider);
        LlmRouter::new(registry).with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn retries_retryable_errors_then_succeeds() {
        let provider = Arc::new(RetryableFailProvider {
            call_count: AtomicUsize::new(0),
            fail_times: 2,
        });
        let router = router_with("openai", provider.clone());

        let text = router.complete("sys", "input", "openai/gpt-4o").await.unwrap();
        assert_eq!(text, "ok after 2 retries");
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let provider = Arc::new(RetryableFailProvider {
            call_count: AtomicUsize::new(0),
            fail_times: 10,
        });
        let router = router_with("openai", provider.clone());

        let err = router.complete("sys", "input", "openai/gpt-4o").await.unwrap_err();
        assert!(err.to_string().contains("[retryable]"));
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let provider = Arc::new(PermanentFailProvider {
            call_count: AtomicUsize::new(0),
        });
        let router = router_with("openai", provider.clone());

        let err = router.complete("sys", "input", "openai/gpt-4o").await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let provider = Arc::new(RecordingProvider {
            reply: "  \n".into(),
            ..Default::default()
        });
        let router = router_with("openai", provider);

        let err = router.complete("sys", "input", "openai/gpt-4o").await.unwrap_err();
        assert!(err.to_string().contains("empty completion"));
    }

    #[tokio::test]
    async fn complete_sends_system_input_and_temperature() {
        let provider = Arc::new(RecordingProvider {
            reply: "done".into(),
            ..Default::default()
        });
        let router = router_with("openrouter", provider.clone());

        let text = router
            .complete_at("be brief", "paper", "openrouter/openai/gpt-4o-mini", 0.7)
            .await
            .unwrap();
        assert_eq!(text, "done");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "openai/gpt-4o-mini");
        assert_eq!(seen[0].system.as_deref(), Some("be brief"));
        assert_eq!(seen[0].messages[0].text(), "paper");
        assert_eq!(seen[0].temperature, Some(0.7));
    }

    #[tokio::test]
    async fn unknown_provider_and_bare_model_fail() {
        let provider = Arc::new(RecordingProvider::default());
        let router = router_with("openai", provider.clone());

        let err = router.complete("s", "i", "missing/model").await.unwrap_err();
        assert!(err.to_string().contains("provider not found"));

        let err = router.complete("s", "i", "gpt-4o").await.unwrap_err();
        assert!(err.to_string().contains("expected provider/model"));
        assert!(provider.seen.lock().unwrap().is_empty());
    }
}
