use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use papercast_schema::Role;

use crate::router::LanguageModel;
use crate::templates::{render, WEIGHT_CLIPPER_PROMPT};

/// Post-optimization cleanup of a candidate instruction.
#[async_trait]
pub trait Sanitizer: Send + Sync {
    async fn clean(&self, candidate: &str, role: Role) -> Result<String>;
}

/// One model call that strips cross-role and topic-specific guidance.
pub struct WeightClipper {
    model: Arc<dyn LanguageModel>,
    model_id: String,
}

impl WeightClipper {
    pub fn new(model: Arc<dyn LanguageModel>, model_id: impl Into<String>) -> Self {
        Self {
            model,
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl Sanitizer for WeightClipper {
    async fn clean(&self, candidate: &str, role: Role) -> Result<String> {
        let system = render(WEIGHT_CLIPPER_PROMPT, &[("role", role.as_str())]);
        let cleaned = self.model.complete(&system, candidate, &self.model_id).await?;
        Ok(cleaned.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Scripted {
        reply: &'static str,
        seen: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl LanguageModel for Scripted {
        async fn complete(&self, system: &str, input: &str, model: &str) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), input.to_string(), model.to_string()));
            Ok(self.reply.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl LanguageModel for Broken {
        async fn complete(&self, _: &str, _: &str, _: &str) -> Result<String> {
            anyhow::bail!("openai api error (500) [retryable]: boom")
        }
    }

    #[tokio::test]
    async fn clean_trims_and_passes_role_and_candidate() {
        let model = Arc::new(Scripted {
            reply: "\n  Extract key points.  \n",
            seen: Mutex::new(Vec::new()),
        });
        let clipper = WeightClipper::new(model.clone(), "openai/gpt-4o");

        let out = clipper
            .clean("Extract key points about transformers.", Role::Summarizer)
            .await
            .unwrap();
        assert_eq!(out, "Extract key points.");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.contains("(summarizer)"));
        assert_eq!(seen[0].1, "Extract key points about transformers.");
        assert_eq!(seen[0].2, "openai/gpt-4o");
    }

    #[tokio::test]
    async fn model_failure_propagates_unchanged() {
        let clipper = WeightClipper::new(Arc::new(Broken), "openai/gpt-4o");
        let err = clipper.clean("x", Role::Enhancer).await.unwrap_err();
        assert_eq!(err.to_string(), "openai api error (500) [retryable]: boom");
    }
}
