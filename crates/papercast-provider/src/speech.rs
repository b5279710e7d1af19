use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Serialize;

use crate::openai::{format_api_error, ApiErrorEnvelope};

/// Text-to-speech backend producing MP3 bytes for one utterance.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes>;
}

/// `POST {base}/audio/speech` on OpenAI or a compatible server.
#[derive(Debug, Clone)]
pub struct OpenAiSpeechProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

impl OpenAiSpeechProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechProvider {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes> {
        let url = format!("{}/audio/speech", self.api_base);
        let payload = SpeechRequest {
            model: &self.model,
            voice,
            input: text,
            response_format: "mp3",
        };

        let resp = self
            .client
            .post(url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await?;
            let parsed = serde_json::from_str::<ApiErrorEnvelope>(&body).ok();
            return Err(format_api_error("openai speech", status, parsed));
        }

        let audio = resp.bytes().await?;
        if audio.is_empty() {
            return Err(anyhow!("openai speech api returned no audio"));
        }
        tracing::debug!(voice, bytes = audio.len(), "synthesized utterance");
        Ok(audio)
    }
}

/// Offline synthesizer returning the voice-tagged text as its "audio".
pub struct StubSpeech;

#[async_trait]
impl SpeechSynthesizer for StubSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes> {
        let tag = format!("[{voice}] {text}\n");
        Ok(Bytes::from(tag.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_request_shape() {
        let payload = SpeechRequest {
            model: "tts-1",
            voice: "onyx",
            input: "Welcome to the show.",
            response_format: "mp3",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["model"], "tts-1");
        assert_eq!(json["voice"], "onyx");
        assert_eq!(json["input"], "Welcome to the show.");
        assert_eq!(json["response_format"], "mp3");
    }

    #[tokio::test]
    async fn stub_speech_tags_voice() {
        let audio = StubSpeech.synthesize("Hi there", "nova").await.unwrap();
        assert_eq!(&audio[..], b"[nova] Hi there\n");
    }
}
