//! Simulated listeners: an invented personality critiques a podcast, and the
//! critique drives one optimization step.

use std::sync::Arc;

use anyhow::{bail, Result};
use papercast_schema::Timestamp;
use papercast_store::{PodcastStateStore, PromptStore};
use serde::Serialize;

use crate::driver::{OptimizationDriver, OptimizationReport};
use crate::optimizer::check_target;
use crate::pipeline::PodcastPipeline;
use crate::router::LanguageModel;
use crate::templates::{render, FEEDBACK_PROMPT, PERSONALITY_PROMPT};

const PERSONALITY_TEMPERATURE: f32 = 0.7;
const FEEDBACK_TEMPERATURE: f32 = 0.0;

pub struct Critic {
    model: Arc<dyn LanguageModel>,
    personality_model: String,
    feedback_model: String,
}

impl Critic {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        personality_model: impl Into<String>,
        feedback_model: impl Into<String>,
    ) -> Self {
        Self {
            model,
            personality_model: personality_model.into(),
            feedback_model: feedback_model.into(),
        }
    }

    pub async fn create_personality(&self) -> Result<String> {
        let personality = self
            .model
            .complete_at(
                PERSONALITY_PROMPT,
                "Describe the listener.",
                &self.personality_model,
                PERSONALITY_TEMPERATURE,
            )
            .await?;
        Ok(personality.trim().to_string())
    }

    pub async fn feedback(
        &self,
        original_text: &str,
        final_product: &str,
        personality: &str,
    ) -> Result<String> {
        if [original_text, final_product, personality]
            .iter()
            .any(|s| s.trim().is_empty())
        {
            bail!("original text, final product and personality are all required for feedback");
        }

        let system = render(
            FEEDBACK_PROMPT,
            &[
                ("personality", personality),
                ("original_text", original_text),
                ("final_product", final_product),
            ],
        );
        let feedback = self
            .model
            .complete_at(
                &system,
                "Share your feedback.",
                &self.feedback_model,
                FEEDBACK_TEMPERATURE,
            )
            .await?;
        Ok(feedback.trim().to_string())
    }

    /// A fresh personality's feedback on `final_product`.
    pub async fn critique(&self, original_text: &str, final_product: &str) -> Result<(String, String)> {
        let personality = self.create_personality().await?;
        let feedback = self
            .feedback(original_text, final_product, &personality)
            .await?;
        Ok((personality, feedback))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub personality: String,
    pub feedback: String,
    pub optimization: OptimizationReport,
}

/// One unattended feedback cycle: generate with the latest prompts, let a
/// simulated listener critique it, and optimize into a new version.
pub struct Simulation {
    pipeline: PodcastPipeline,
    prompts: PromptStore,
    states: PodcastStateStore,
    critic: Critic,
    driver: OptimizationDriver,
}

impl Simulation {
    pub fn new(
        pipeline: PodcastPipeline,
        prompts: PromptStore,
        states: PodcastStateStore,
        critic: Critic,
        driver: OptimizationDriver,
    ) -> Self {
        Self {
            pipeline,
            prompts,
            states,
            critic,
            driver,
        }
    }

    /// The state and the new prompts share `new_timestamp`; prompts are
    /// derived from the latest existing version, or the baselines.
    pub async fn run(&self, text: &str, new_timestamp: &Timestamp) -> Result<SimulationReport> {
        let last = self.prompts.latest().await?;
        check_target(last.as_ref(), new_timestamp)?;
        tracing::info!(
            from = last.as_ref().map(Timestamp::as_str).unwrap_or("baseline"),
            to = %new_timestamp,
            "starting simulated feedback cycle"
        );

        let mut state = self.pipeline.run(text, last.as_ref()).await?;
        let (personality, feedback) = self
            .critic
            .critique(&state.main_text, &state.enhanced_script)
            .await?;

        state.feedback = Some(feedback.clone());
        self.states.save(new_timestamp, &state).await?;

        let optimization = self
            .driver
            .optimize_all(last, new_timestamp.clone(), new_timestamp.clone())
            .await?;
        Ok(SimulationReport {
            personality,
            feedback,
            optimization,
        })
    }
}
