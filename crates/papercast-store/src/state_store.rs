use std::path::{Path, PathBuf};

use papercast_schema::{PodcastState, Timestamp};
use tokio::fs;

use crate::StoreError;

/// One JSON record per timestamp: `<dir>/podcast_state_{timestamp}.json`.
#[derive(Debug, Clone)]
pub struct PodcastStateStore {
    dir: PathBuf,
}

impl PodcastStateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub async fn save(&self, timestamp: &Timestamp, state: &PodcastState) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_string_pretty(state)?;
        fs::write(self.path(timestamp), body).await?;
        tracing::info!(%timestamp, "saved podcast state");
        Ok(())
    }

    pub async fn load(&self, timestamp: &Timestamp) -> Result<PodcastState, StoreError> {
        match self.try_load(timestamp).await? {
            Some(state) => Ok(state),
            None => Err(StoreError::StateNotFound(timestamp.clone())),
        }
    }

    /// Stores `feedback` on an existing record, replacing any earlier text.
    pub async fn attach_feedback(
        &self,
        timestamp: &Timestamp,
        feedback: &str,
    ) -> Result<(), StoreError> {
        let Some(mut state) = self.try_load(timestamp).await? else {
            return Err(StoreError::MissingState(timestamp.clone()));
        };
        if let Some(previous) = state.feedback.as_deref() {
            tracing::warn!(
                %timestamp,
                previous_len = previous.len(),
                "overwriting existing feedback"
            );
        }
        state.feedback = Some(feedback.to_string());
        self.save(timestamp, &state).await
    }

    async fn try_load(&self, timestamp: &Timestamp) -> Result<Option<PodcastState>, StoreError> {
        match fs::read_to_string(self.path(timestamp)).await {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn path(&self, timestamp: &Timestamp) -> PathBuf {
        self.dir.join(format!("podcast_state_{timestamp}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::PodcastStateStore;
    use crate::StoreError;
    use anyhow::Result;
    use papercast_schema::{PodcastState, Timestamp};
    use tempfile::TempDir;
    use tokio::fs;

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse(raw).expect("valid timestamp")
    }

    fn sample() -> PodcastState {
        PodcastState {
            main_text: "paper".into(),
            key_points: "points".into(),
            script_essence: "script".into(),
            enhanced_script: "Host: hi\nGuest: hello".into(),
            feedback: None,
        }
    }

    #[tokio::test]
    async fn save_and_load_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let store = PodcastStateStore::new(dir.path());
        let t = ts("20240101_000000");

        store.save(&t, &sample()).await?;
        assert_eq!(store.load(&t).await?, sample());
        assert!(dir.path().join("podcast_state_20240101_000000.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn load_missing_is_state_not_found() -> Result<()> {
        let dir = TempDir::new()?;
        let store = PodcastStateStore::new(dir.path());

        let err = store.load(&ts("20240101_000000")).await.unwrap_err();
        assert!(matches!(err, StoreError::StateNotFound(_)));
        Ok(())
    }

    #[tokio::test]
    async fn attach_feedback_overwrites() -> Result<()> {
        let dir = TempDir::new()?;
        let store = PodcastStateStore::new(dir.path());
        let t = ts("20240101_000000");
        store.save(&t, &sample()).await?;

        store.attach_feedback(&t, "too long").await?;
        store.attach_feedback(&t, "too dry").await?;

        let state = store.load(&t).await?;
        assert_eq!(state.feedback.as_deref(), Some("too dry"));
        assert_eq!(state.main_text, "paper");
        Ok(())
    }

    #[tokio::test]
    async fn attach_feedback_without_state_is_reported() -> Result<()> {
        let dir = TempDir::new()?;
        let store = PodcastStateStore::new(dir.path());
        let t = ts("20240101_000000");

        let err = store.attach_feedback(&t, "anything").await.unwrap_err();
        assert!(matches!(err, StoreError::MissingState(ref missing) if *missing == t));
        assert!(!dir.path().join("podcast_state_20240101_000000.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn reads_record_written_by_hand() -> Result<()> {
        let dir = TempDir::new()?;
        let store = PodcastStateStore::new(dir.path());
        fs::write(
            dir.path().join("podcast_state_20240305_101010.json"),
            r#"{"main_text":"m","key_points":"k","script_essence":"s","enhanced_script":"e","feedback":"f"}"#,
        )
        .await?;

        let state = store.load(&ts("20240305_101010")).await?;
        assert_eq!(state.feedback.as_deref(), Some("f"));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_record_is_json_error() -> Result<()> {
        let dir = TempDir::new()?;
        let store = PodcastStateStore::new(dir.path());
        fs::write(dir.path().join("podcast_state_20240101_000000.json"), "{not json").await?;

        let err = store.load(&ts("20240101_000000")).await.unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
        Ok(())
    }
}
