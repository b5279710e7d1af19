use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use papercast_core::{
    init_workspace, LanguageModel, MainConfig, Papercast, PapercastConfig, ProviderEntry,
    LOSS_PROMPT,
};
use papercast_provider::{ProviderType, StubSpeech};
use papercast_schema::{Role, Timestamp, VariantKind};
use tempfile::TempDir;

/// Plays every model in the system: stages answer with dialogue, the backward
/// step proposes a fixed instruction, the clipper returns its input.
#[derive(Default)]
struct PlayAll {
    calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for PlayAll {
    async fn complete(&self, system: &str, input: &str, _model: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if system == LOSS_PROMPT {
            return Ok("The dialogue is too long.".into());
        }
        if system.starts_with("You improve system prompts") {
            return Ok("Keep every turn under two sentences.".into());
        }
        if system.starts_with("You edit system prompts") {
            return Ok(input.to_string());
        }
        Ok(format!("Host: {}\nGuest: Sure.", input.lines().next().unwrap_or("")))
    }
}

fn stub_config() -> PapercastConfig {
    PapercastConfig {
        main: MainConfig::default(),
        providers: vec![ProviderEntry {
            provider_id: "openai".into(),
            provider_type: ProviderType::Stub,
            enabled: true,
            api_base: None,
            api_key: None,
        }],
    }
}

#[tokio::test]
async fn create_feedback_and_recreate_with_new_prompts() -> Result<()> {
    let dir = TempDir::new()?;
    init_workspace(dir.path())?;
    let model = Arc::new(PlayAll::default());
    let app = Papercast::with_model(dir.path(), stub_config(), model.clone(), Arc::new(StubSpeech));

    let first = app.studio().create_from_text("A paper about sparse attention.").await?;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].kind, VariantKind::Baseline);
    let old = first[0].timestamp.clone();
    assert!(app.audio_dir().join(&first[0].audio_file).exists());

    let new = Timestamp::parse("29990101_000000")?;
    let before = model.calls.load(Ordering::SeqCst);
    let report = app.driver().run(&old, &new, "Too long and rambling.").await?;
    assert!(report.all_succeeded());
    assert_eq!(model.calls.load(Ordering::SeqCst) - before, 3 * 16);

    for role in Role::ALL {
        let text = app.prompts().load(role, Some(&new)).await?;
        assert_eq!(text, "Keep every turn under two sentences.");
    }
    assert_eq!(
        app.states().load(&old).await?.feedback.as_deref(),
        Some("Too long and rambling.")
    );

    let second = app.studio().create_from_text("Another paper.").await?;
    assert_eq!(second[0].kind, VariantKind::Last);
    assert_eq!(second[0].timestamp, new);
    Ok(())
}

#[tokio::test]
async fn votes_accumulate_per_timestamp() -> Result<()> {
    let dir = TempDir::new()?;
    let app = Papercast::with_model(
        dir.path(),
        stub_config(),
        Arc::new(PlayAll::default()),
        Arc::new(StubSpeech),
    );
    let ts = Timestamp::parse("20240101_000000")?;

    assert_eq!(app.votes().record_vote(&ts).await?, 1);
    assert_eq!(app.votes().record_vote(&ts).await?, 2);
    assert_eq!(app.votes().tally().await?.get(&ts), Some(&2));
    Ok(())
}
