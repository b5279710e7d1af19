use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use futures::future::try_join_all;
use papercast_schema::{DialogueLine, PodcastState, Timestamp, VariantKind};
use papercast_store::{PodcastStateStore, PromptStore};
use rand::seq::IteratorRandom;
use rand::Rng;
use serde::Serialize;

use crate::audio::{audio_file_name, AudioAssembler};
use crate::dialogue::parse_dialogue;
use crate::pdf::{check_text, extract_text};
use crate::pipeline::PodcastPipeline;

/// Which prompt version one variant is produced with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPlan {
    pub kind: VariantKind,
    pub version: Option<Timestamp>,
}

/// With no history, a single baseline run. Otherwise the latest version and,
/// when there is more than one, a uniform pick among the older ones.
pub fn choose_variants<R: Rng + ?Sized>(
    history: &BTreeSet<Timestamp>,
    rng: &mut R,
) -> Vec<VariantPlan> {
    let Some(last) = history.iter().next_back() else {
        return vec![VariantPlan {
            kind: VariantKind::Baseline,
            version: None,
        }];
    };

    let mut plan = vec![VariantPlan {
        kind: VariantKind::Last,
        version: Some(last.clone()),
    }];
    if let Some(random) = history.iter().filter(|ts| *ts != last).choose(rng) {
        plan.push(VariantPlan {
            kind: VariantKind::Random,
            version: Some(random.clone()),
        });
    }
    plan
}

#[derive(Debug, Clone, Serialize)]
pub struct PodcastVariant {
    pub kind: VariantKind,
    pub timestamp: Timestamp,
    pub state: PodcastState,
    pub dialogue: Vec<DialogueLine>,
    pub audio_file: String,
}

/// Creates podcasts from documents: pipeline, state snapshot, audio.
pub struct PodcastStudio {
    pipeline: PodcastPipeline,
    prompts: PromptStore,
    states: PodcastStateStore,
    audio: Arc<AudioAssembler>,
    max_tokens: usize,
}

impl PodcastStudio {
    pub fn new(
        pipeline: PodcastPipeline,
        prompts: PromptStore,
        states: PodcastStateStore,
        audio: Arc<AudioAssembler>,
        max_tokens: usize,
    ) -> Self {
        Self {
            pipeline,
            prompts,
            states,
            audio,
            max_tokens,
        }
    }

    pub async fn create_from_pdf(&self, bytes: &[u8]) -> Result<Vec<PodcastVariant>> {
        let extracted = extract_text(bytes, self.max_tokens)?;
        tracing::info!(tokens = extracted.token_count, "document accepted");
        self.create_from_text(&extracted.text).await
    }

    pub async fn create_from_text(&self, text: &str) -> Result<Vec<PodcastVariant>> {
        let text = check_text(text.to_string(), self.max_tokens)?.text;
        let history = self.prompts.list_timestamps().await?;
        let plan = {
            let mut rng = rand::thread_rng();
            choose_variants(&history, &mut rng)
        };

        let runs: Vec<_> = plan
            .into_iter()
            .map(|variant| {
                let text = text.clone();
                async move {
                    self.create_single(&text, variant.kind, variant.version.as_ref())
                        .await
                }
            })
            .collect();
        try_join_all(runs).await
    }

    /// One podcast with the given prompt version, stored under that
    /// version's timestamp (a fresh one for the baseline).
    pub async fn create_single(
        &self,
        text: &str,
        kind: VariantKind,
        version: Option<&Timestamp>,
    ) -> Result<PodcastVariant> {
        let timestamp = version.cloned().unwrap_or_else(Timestamp::now);
        let state = self.pipeline.run(text, version).await?;
        self.states.save(&timestamp, &state).await?;

        let dialogue = parse_dialogue(&state.enhanced_script);
        self.audio.assemble(&timestamp, &dialogue).await?;

        tracing::info!(?kind, %timestamp, lines = dialogue.len(), "podcast created");
        Ok(PodcastVariant {
            kind,
            audio_file: audio_file_name(&timestamp),
            timestamp,
            state,
            dialogue,
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use papercast_provider::StubSpeech;
    use papercast_schema::Role;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    use super::*;
    use crate::dialogue::Voices;
    use crate::router::LanguageModel;

    /// The enhancer answers with a two-line dialogue naming its prompt.
    struct Scripted;

    #[async_trait]
    impl LanguageModel for Scripted {
        async fn complete(&self, system: &str, input: &str, _model: &str) -> Result<String> {
            if system.starts_with("enhancer") {
                Ok(format!("Host: {system}\nGuest: {input}"))
            } else {
                Ok(format!("{system}:{input}"))
            }
        }
    }

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse(raw).unwrap()
    }

    fn history(raw: &[&str]) -> BTreeSet<Timestamp> {
        raw.iter().map(|r| ts(r)).collect()
    }

    async fn studio(dir: &TempDir) -> (PodcastStudio, PromptStore, PodcastStateStore) {
        let baseline = dir.path().join("prompts");
        tokio::fs::create_dir_all(&baseline).await.unwrap();
        for role in Role::ALL {
            tokio::fs::write(baseline.join(format!("{role}_prompt.txt")), role.as_str())
                .await
                .unwrap();
        }
        let prompts = PromptStore::new(&baseline, dir.path().join("prompt_history"));
        let states = PodcastStateStore::new(dir.path().join("podcast_states"));
        let audio = Arc::new(AudioAssembler::new(
            Arc::new(StubSpeech),
            Voices::default(),
            dir.path().join("audio"),
        ));
        let pipeline = PodcastPipeline::new(Arc::new(Scripted), prompts.clone(), "fake/m");
        let studio = PodcastStudio::new(pipeline, prompts.clone(), states.clone(), audio, 1000);
        (studio, prompts, states)
    }

    #[test]
    fn empty_history_plans_one_baseline() {
        let mut rng = StdRng::seed_from_u64(7);
        let plan = choose_variants(&BTreeSet::new(), &mut rng);
        assert_eq!(
            plan,
            vec![VariantPlan {
                kind: VariantKind::Baseline,
                version: None
            }]
        );
    }

    #[test]
    fn single_entry_history_plans_only_last() {
        let mut rng = StdRng::seed_from_u64(7);
        let plan = choose_variants(&history(&["20240101_000000"]), &mut rng);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].kind, VariantKind::Last);
    }

    #[test]
    fn random_variant_is_never_the_latest() {
        let hist = history(&["20240101_000000", "20240102_000000", "20240103_000000"]);
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = choose_variants(&hist, &mut rng);
            assert_eq!(plan[0].version, Some(ts("20240103_000000")));
            assert_eq!(plan[1].kind, VariantKind::Random);
            assert_ne!(plan[1].version, Some(ts("20240103_000000")));
        }
    }

    #[tokio::test]
    async fn baseline_run_saves_state_and_audio() {
        let dir = TempDir::new().unwrap();
        let (studio, _, states) = studio(&dir).await;

        let variants = studio.create_from_text("paper").await.unwrap();
        assert_eq!(variants.len(), 1);
        let variant = &variants[0];
        assert_eq!(variant.kind, VariantKind::Baseline);
        assert_eq!(variant.dialogue.len(), 2);
        assert_eq!(variant.dialogue[0].text, "enhancer");

        let saved = states.load(&variant.timestamp).await.unwrap();
        assert_eq!(saved, variant.state);
        assert!(dir.path().join("audio").join(&variant.audio_file).exists());
    }

    #[tokio::test]
    async fn history_runs_produce_last_and_random_variants() {
        let dir = TempDir::new().unwrap();
        let (studio, prompts, states) = studio(&dir).await;
        for raw in ["20240101_000000", "20240102_000000"] {
            prompts
                .save(Role::Enhancer, &ts(raw), &format!("enhancer {raw}"))
                .await
                .unwrap();
        }

        let variants = studio.create_from_text("paper").await.unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].kind, VariantKind::Last);
        assert_eq!(variants[0].timestamp, ts("20240102_000000"));
        assert_eq!(variants[0].dialogue[0].text, "enhancer 20240102_000000");
        assert_eq!(variants[1].kind, VariantKind::Random);
        assert_eq!(variants[1].timestamp, ts("20240101_000000"));
        assert_eq!(variants[1].audio_file, "podcast_20240101_000000.mp3");

        assert!(states.load(&ts("20240101_000000")).await.is_ok());
        assert!(states.load(&ts("20240102_000000")).await.is_ok());
    }

    #[tokio::test]
    async fn over_limit_text_is_rejected_before_any_call() {
        let dir = TempDir::new().unwrap();
        let (studio, _, _) = studio(&dir).await;
        let err = studio.create_from_text(&"x".repeat(5000)).await.unwrap_err();
        assert!(err.to_string().contains("too long"));
        assert!(!dir.path().join("podcast_states").exists());
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn creation_can_run_on_a_spawned_task() {
        let dir = TempDir::new().unwrap();
        let (studio, prompts, _) = studio(&dir).await;
        prompts
            .save(Role::Enhancer, &ts("20240101_000000"), "enhancer v1")
            .await
            .unwrap();

        let studio = Arc::new(studio);
        let pdf = studio.create_from_pdf(b"not a pdf");
        assert_send(&pdf);
        drop(pdf);

        let task = tokio::spawn({
            let studio = Arc::clone(&studio);
            async move { studio.create_from_text("paper").await }
        });
        let variants = task.await.unwrap().unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].kind, VariantKind::Last);
    }
}
