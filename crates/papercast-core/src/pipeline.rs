use std::sync::Arc;

use anyhow::{bail, Context, Result};
use papercast_schema::{PodcastState, Role, Timestamp};
use papercast_store::PromptStore;

use crate::router::LanguageModel;

/// Sampling temperature used for each stage.
pub fn stage_temperature(role: Role) -> f32 {
    match role {
        Role::Summarizer | Role::Scriptwriter => 0.0,
        Role::Enhancer => 0.7,
    }
}

/// Summarizer → scriptwriter → enhancer, each stage reading the previous
/// stage's output with the prompt version chosen for the run.
#[derive(Clone)]
pub struct PodcastPipeline {
    model: Arc<dyn LanguageModel>,
    prompts: PromptStore,
    model_id: String,
}

impl PodcastPipeline {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        prompts: PromptStore,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            model,
            prompts,
            model_id: model_id.into(),
        }
    }

    /// Runs all three stages; `None` uses the baseline prompts.
    pub async fn run(&self, main_text: &str, version: Option<&Timestamp>) -> Result<PodcastState> {
        let mut state = PodcastState::from_main_text(main_text);

        for role in Role::ALL {
            let input = state.input_for(role).trim();
            if input.is_empty() {
                bail!("{role} stage has no input");
            }

            let prompt = self
                .prompts
                .load(role, version)
                .await
                .with_context(|| format!("loading {role} prompt"))?;

            let output = self
                .model
                .complete_at(&prompt, input, &self.model_id, stage_temperature(role))
                .await
                .with_context(|| format!("{role} stage failed"))?;

            tracing::debug!(
                %role,
                version = version.map(Timestamp::as_str).unwrap_or("baseline"),
                chars = output.len(),
                "pipeline stage complete"
            );
            state.set_output(role, output.trim().to_string());
        }

        Ok(state)
    }
}
