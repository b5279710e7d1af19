use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use papercast_schema::Timestamp;
use tokio::fs;
use tokio::sync::Mutex;

use crate::StoreError;

pub type VoteTally = BTreeMap<Timestamp, u64>;

/// Listener preference counts in a single `votes.json`.
#[derive(Debug)]
pub struct VoteStore {
    path: PathBuf,
    // Serializes read-modify-write within this process.
    lock: Mutex<()>,
}

impl VoteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub async fn tally(&self) -> Result<VoteTally, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(body) if body.trim().is_empty() => Ok(VoteTally::new()),
            Ok(body) => Ok(serde_json::from_str(&body)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(VoteTally::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Adds one vote and returns the new count for `timestamp`.
    pub async fn record_vote(&self, timestamp: &Timestamp) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let mut tally = self.tally().await?;
        let count = tally.entry(timestamp.clone()).or_insert(0);
        *count += 1;
        let count = *count;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&tally)?).await?;
        tracing::info!(%timestamp, count, "recorded vote");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::VoteStore;
    use anyhow::Result;
    use papercast_schema::Timestamp;
    use tempfile::TempDir;

    #[tokio::test]
    async fn empty_store_has_no_votes() -> Result<()> {
        let dir = TempDir::new()?;
        let store = VoteStore::new(dir.path().join("votes.json"));
        assert!(store.tally().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn record_vote_increments() -> Result<()> {
        let dir = TempDir::new()?;
        let store = VoteStore::new(dir.path().join("votes.json"));
        let a = Timestamp::parse("20240101_000000")?;
        let b = Timestamp::parse("20240102_000000")?;

        assert_eq!(store.record_vote(&a).await?, 1);
        assert_eq!(store.record_vote(&a).await?, 2);
        assert_eq!(store.record_vote(&b).await?, 1);

        let tally = store.tally().await?;
        assert_eq!(tally.get(&a), Some(&2));
        assert_eq!(tally.get(&b), Some(&1));

        let raw = std::fs::read_to_string(dir.path().join("votes.json"))?;
        let json: serde_json::Value = serde_json::from_str(&raw)?;
        assert_eq!(json["20240101_000000"], 2);
        Ok(())
    }
}
