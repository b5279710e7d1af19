pub mod audio;
pub mod config;
pub mod critic;
pub mod dialogue;
pub mod driver;
pub mod evaluation;
pub mod optimizer;
pub mod pdf;
pub mod pipeline;
pub mod router;
pub mod sanitizer;
pub mod studio;
pub mod templates;
pub mod workspace;

pub use audio::*;
pub use config::*;
pub use critic::*;
pub use dialogue::*;
pub use driver::*;
pub use evaluation::*;
pub use optimizer::*;
pub use pdf::*;
pub use pipeline::*;
pub use router::*;
pub use sanitizer::*;
pub use studio::*;
pub use templates::*;
pub use workspace::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use papercast_provider::SpeechSynthesizer;
use papercast_store::{PodcastStateStore, PromptStore, VoteStore};

/// Everything wired from one config root: stores, model router, speech.
pub struct Papercast {
    root: PathBuf,
    config: PapercastConfig,
    model: Arc<dyn LanguageModel>,
    speech: Arc<dyn SpeechSynthesizer>,
    prompts: PromptStore,
    states: PodcastStateStore,
    votes: VoteStore,
}

impl Papercast {
    pub fn from_config(root: impl AsRef<Path>, config: PapercastConfig) -> Result<Self> {
        let model: Arc<dyn LanguageModel> = Arc::new(LlmRouter::from_config(&config)?);
        let speech = build_speech(&config)?;
        Ok(Self::with_model(root, config, model, speech))
    }

    pub fn with_model(
        root: impl AsRef<Path>,
        config: PapercastConfig,
        model: Arc<dyn LanguageModel>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let root = root.as_ref().to_path_buf();
        let storage = &config.main.storage;
        let prompts = PromptStore::new(
            root.join(&storage.prompts_dir),
            root.join(&storage.history_dir),
        );
        let states = PodcastStateStore::new(root.join(&storage.states_dir));
        let votes = VoteStore::new(root.join(&storage.votes_file));
        Self {
            root,
            config,
            model,
            speech,
            prompts,
            states,
            votes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &PapercastConfig {
        &self.config
    }

    pub fn prompts(&self) -> &PromptStore {
        &self.prompts
    }

    pub fn states(&self) -> &PodcastStateStore {
        &self.states
    }

    pub fn votes(&self) -> &VoteStore {
        &self.votes
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join(&self.config.main.storage.audio_dir)
    }

    pub fn pipeline(&self) -> PodcastPipeline {
        PodcastPipeline::new(
            self.model.clone(),
            self.prompts.clone(),
            self.config.main.models.pipeline.clone(),
        )
    }

    pub fn optimizer(&self) -> TextualOptimizer {
        let models = &self.config.main.models;
        let settings = &self.config.main.optimizer;
        let sanitizer = Arc::new(WeightClipper::new(self.model.clone(), models.sanitizer.clone()));
        let config = OptimizerConfig {
            rounds: settings.rounds,
            line_width: settings.line_width,
            engine_model: models.engine.clone(),
            backward_model: models.backward.clone(),
        };
        TextualOptimizer::new(
            self.model.clone(),
            sanitizer,
            self.prompts.clone(),
            self.states.clone(),
            config,
        )
    }

    pub fn driver(&self) -> OptimizationDriver {
        let timeout = self
            .config
            .main
            .optimizer
            .role_timeout_secs
            .map(Duration::from_secs);
        OptimizationDriver::new(Arc::new(self.optimizer()), self.states.clone(), timeout)
    }

    pub fn studio(&self) -> PodcastStudio {
        let speech = &self.config.main.speech;
        let audio = AudioAssembler::new(
            self.speech.clone(),
            Voices::new(speech.host_voice.clone(), speech.guest_voice.clone()),
            self.audio_dir(),
        );
        PodcastStudio::new(
            self.pipeline(),
            self.prompts.clone(),
            self.states.clone(),
            Arc::new(audio),
            self.config.main.pdf.max_tokens,
        )
    }

    pub fn evaluation(&self) -> EvaluationRunner {
        let evaluator =
            PairwiseEvaluator::new(self.model.clone(), self.config.main.models.evaluator.clone());
        EvaluationRunner::new(
            self.pipeline(),
            self.prompts.clone(),
            evaluator,
            self.config.main.pdf.max_tokens,
        )
    }

    pub fn simulation(&self) -> Simulation {
        let models = &self.config.main.models;
        let critic = Critic::new(self.model.clone(), models.engine.clone(), models.critic.clone());
        Simulation::new(
            self.pipeline(),
            self.prompts.clone(),
            self.states.clone(),
            critic,
            self.driver(),
        )
    }
}
