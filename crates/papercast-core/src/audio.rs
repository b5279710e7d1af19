use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use papercast_provider::{
    openai_compat::OPENAI_BASE, OpenAiSpeechProvider, ProviderType, SpeechSynthesizer, StubSpeech,
};
use papercast_schema::{DialogueLine, Timestamp};

use crate::config::PapercastConfig;
use crate::dialogue::{render_dialogue, Voices};

/// Utterances synthesized at once; output order is preserved regardless.
const SYNTHESIS_CONCURRENCY: usize = 4;

pub fn audio_file_name(timestamp: &Timestamp) -> String {
    format!("podcast_{timestamp}.mp3")
}

pub fn dialogue_file_name(timestamp: &Timestamp) -> String {
    format!("dialogue_{timestamp}.txt")
}

/// Turns parsed dialogue into one MP3 per podcast.
pub struct AudioAssembler {
    speech: Arc<dyn SpeechSynthesizer>,
    voices: Voices,
    audio_dir: PathBuf,
}

impl AudioAssembler {
    pub fn new(
        speech: Arc<dyn SpeechSynthesizer>,
        voices: Voices,
        audio_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            speech,
            voices,
            audio_dir: audio_dir.as_ref().to_path_buf(),
        }
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// Synthesizes every line, writes `podcast_<ts>.mp3` and the matching
    /// transcript, and returns the audio path.
    pub async fn assemble(&self, timestamp: &Timestamp, lines: &[DialogueLine]) -> Result<PathBuf> {
        if lines.is_empty() {
            bail!("script has no Host/Guest lines to synthesize");
        }

        let jobs: Vec<_> = lines
            .iter()
            .enumerate()
            .map(|(index, line)| {
                let speech = Arc::clone(&self.speech);
                let voice = self.voices.voice_for(line.speaker).to_string();
                let text = line.text.clone();
                async move {
                    speech
                        .synthesize(&text, &voice)
                        .await
                        .with_context(|| format!("synthesizing line {} ({voice})", index + 1))
                }
            })
            .collect();
        let segments: Vec<Bytes> = futures::stream::iter(jobs)
            .buffered(SYNTHESIS_CONCURRENCY)
            .try_collect()
            .await?;

        tokio::fs::create_dir_all(&self.audio_dir).await?;
        let audio_path = self.audio_dir.join(audio_file_name(timestamp));
        tokio::fs::write(&audio_path, concat_mp3(&segments)).await?;
        tokio::fs::write(
            self.audio_dir.join(dialogue_file_name(timestamp)),
            render_dialogue(lines),
        )
        .await?;

        tracing::info!(
            path = %audio_path.display(),
            segments = segments.len(),
            "podcast audio written"
        );
        Ok(audio_path)
    }
}

/// Joins MP3 segments, dropping the ID3v2 tag of every segment after the first.
pub fn concat_mp3(segments: &[Bytes]) -> Vec<u8> {
    let total = segments.iter().map(Bytes::len).sum();
    let mut out = Vec::with_capacity(total);
    for (i, segment) in segments.iter().enumerate() {
        let skip = if i == 0 { 0 } else { id3v2_len(segment) };
        out.extend_from_slice(&segment[skip.min(segment.len())..]);
    }
    out
}

/// Length of a leading ID3v2 tag, footer included; 0 when there is none.
pub fn id3v2_len(data: &[u8]) -> usize {
    if data.len() < 10 || &data[..3] != b"ID3" {
        return 0;
    }
    let size_bytes = &data[6..10];
    if size_bytes.iter().any(|b| b & 0x80 != 0) {
        return 0;
    }
    let size = size_bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | usize::from(*b));
    let footer = if data[5] & 0x10 != 0 { 10 } else { 0 };
    10 + size + footer
}

/// Speech backend named by `speech.provider_id`.
pub fn build_speech(config: &PapercastConfig) -> Result<Arc<dyn SpeechSynthesizer>> {
    let speech = &config.main.speech;
    let entry = config
        .provider(&speech.provider_id)
        .ok_or_else(|| anyhow!("speech provider not enabled: {}", speech.provider_id))?;

    let synth: Arc<dyn SpeechSynthesizer> = match entry.provider_type {
        ProviderType::Stub => Arc::new(StubSpeech),
        _ => {
            let key = entry
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| anyhow!("speech provider {} requires api_key", entry.provider_id))?;
            let base = entry
                .api_base
                .clone()
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| OPENAI_BASE.to_string());
            Arc::new(OpenAiSpeechProvider::new(key, base, speech.model.clone()))
        }
    };
    Ok(synth)
}
