use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use papercast_schema::{Role, Timestamp};
use papercast_store::{PodcastStateStore, PromptStore, StoreError};
use serde::Serialize;
use thiserror::Error;

use crate::router::LanguageModel;
use crate::sanitizer::Sanitizer;
use crate::templates::{optimization_target, BACKWARD_PROMPT, LOSS_PROMPT};

/// A model call inside one optimization round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Forward,
    Loss,
    Backward,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Forward => "forward",
            Stage::Loss => "loss",
            Stage::Backward => "backward",
        })
    }
}

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("no feedback recorded for podcast state {0}")]
    MissingFeedback(Timestamp),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{stage} call failed in round {round}: {source}")]
    Model {
        stage: Stage,
        round: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("sanitizer call failed: {0}")]
    Sanitize(#[source] anyhow::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("target version {target} must be newer than source version {from}")]
    StaleTarget { from: Timestamp, target: Timestamp },
}

/// Versions are append-only: a run may only write after the version it reads.
pub fn check_target(
    prompt_from: Option<&Timestamp>,
    target: &Timestamp,
) -> Result<(), OptimizeError> {
    match prompt_from {
        Some(from) if target <= from => Err(OptimizeError::StaleTarget {
            from: from.clone(),
            target: target.clone(),
        }),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub rounds: usize,
    pub line_width: Option<usize>,
    pub engine_model: String,
    pub backward_model: String,
}

impl OptimizerConfig {
    pub fn new(engine_model: impl Into<String>, backward_model: impl Into<String>) -> Self {
        Self {
            rounds: 5,
            line_width: Some(15),
            engine_model: engine_model.into(),
            backward_model: backward_model.into(),
        }
    }
}

/// Which versions one optimization run reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationRequest {
    pub role: Role,
    /// Prompt version to start from; `None` starts from the baseline.
    pub prompt_from: Option<Timestamp>,
    /// Podcast state holding the sample input and the feedback.
    pub state: Timestamp,
    /// Version the result is written under.
    pub target: Timestamp,
}

/// Rewrites a role's instructions against feedback by repeated
/// forward / loss / backward model calls, then sanitizes and saves the result.
///
/// The instruction text is the only state carried between rounds. Nothing is
/// written unless every call succeeds.
pub struct TextualOptimizer {
    model: Arc<dyn LanguageModel>,
    sanitizer: Arc<dyn Sanitizer>,
    prompts: PromptStore,
    states: PodcastStateStore,
    config: OptimizerConfig,
}

impl TextualOptimizer {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        sanitizer: Arc<dyn Sanitizer>,
        prompts: PromptStore,
        states: PodcastStateStore,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            model,
            sanitizer,
            prompts,
            states,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Returns the text that was saved under `request.target`.
    pub async fn optimize(&self, request: &OptimizationRequest) -> Result<String, OptimizeError> {
        let text = self.propose(request).await?;
        self.persist(request, &text).await?;
        Ok(text)
    }

    /// Runs every model call and returns the final instruction without
    /// touching the prompt store.
    pub async fn propose(&self, request: &OptimizationRequest) -> Result<String, OptimizeError> {
        check_target(request.prompt_from.as_ref(), &request.target)?;
        let role = request.role;
        let state = self.states.load(&request.state).await?;
        let feedback = match state.feedback.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => return Err(OptimizeError::MissingFeedback(request.state.clone())),
        };

        let mut instruction = self
            .prompts
            .load(role, request.prompt_from.as_ref())
            .await?;
        let sample_input = state.input_for(role);
        let target = optimization_target(role, &feedback);

        tracing::info!(
            %role,
            from = request.prompt_from.as_ref().map(Timestamp::as_str).unwrap_or("baseline"),
            state = %request.state,
            to = %request.target,
            rounds = self.config.rounds,
            "optimizing prompt"
        );

        for round in 1..=self.config.rounds {
            let output = self
                .model
                .complete(&instruction, sample_input, &self.config.engine_model)
                .await
                .map_err(|source| OptimizeError::Model {
                    stage: Stage::Forward,
                    round,
                    source,
                })?;

            let critique = self
                .model
                .complete(
                    LOSS_PROMPT,
                    &loss_input(&target, &output),
                    &self.config.backward_model,
                )
                .await
                .map_err(|source| OptimizeError::Model {
                    stage: Stage::Loss,
                    round,
                    source,
                })?;

            let updated = self
                .model
                .complete(
                    BACKWARD_PROMPT,
                    &backward_input(role, &instruction, sample_input, &output, &critique),
                    &self.config.backward_model,
                )
                .await
                .map_err(|source| OptimizeError::Model {
                    stage: Stage::Backward,
                    round,
                    source,
                })?;

            instruction = updated.trim().to_string();
            tracing::info!(%role, round, "optimization round complete");
        }

        let cleaned = self
            .sanitizer
            .clean(&instruction, role)
            .await
            .map_err(OptimizeError::Sanitize)?;

        Ok(match self.config.line_width {
            Some(width) => wrap_words(&cleaned, width),
            None => cleaned,
        })
    }

    pub async fn persist(
        &self,
        request: &OptimizationRequest,
        text: &str,
    ) -> Result<(), OptimizeError> {
        self.prompts.save(request.role, &request.target, text).await?;
        Ok(())
    }
}

fn loss_input(target: &str, output: &str) -> String {
    format!("Objective:\n{target}\n\nOutput:\n{output}")
}

fn backward_input(
    role: Role,
    instruction: &str,
    sample_input: &str,
    output: &str,
    critique: &str,
) -> String {
    format!(
        "Role: {role}\n\n\
         Current system prompt:\n{instruction}\n\n\
         Input:\n{sample_input}\n\n\
         Output:\n{output}\n\n\
         Critique:\n{critique}"
    )
}

/// Re-flows text into lines of at most `words_per_line` whitespace-separated words.
pub fn wrap_words(text: &str, words_per_line: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(words_per_line.max(1))
        .map(|line| line.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}
