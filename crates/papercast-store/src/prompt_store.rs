use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use papercast_schema::{Role, Timestamp};
use rand::seq::IteratorRandom;
use rand::Rng;
use regex::Regex;
use tokio::fs;

use crate::StoreError;

/// Lexical shape of a timestamp embedded in a history file name.
static TIMESTAMP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{8}_\d{6})").expect("invalid timestamp regex"));

/// Versioned role instructions.
///
/// Layout:
/// - `<baseline_dir>/{role}_prompt.txt` holds the immutable default.
/// - `<history_dir>/{role}_prompt_{timestamp}.txt` holds one version per
///   (role, timestamp), written only by optimization runs.
#[derive(Debug, Clone)]
pub struct PromptStore {
    baseline_dir: PathBuf,
    history_dir: PathBuf,
}

impl PromptStore {
    pub fn new(baseline_dir: impl AsRef<Path>, history_dir: impl AsRef<Path>) -> Self {
        Self {
            baseline_dir: baseline_dir.as_ref().to_path_buf(),
            history_dir: history_dir.as_ref().to_path_buf(),
        }
    }

    /// The stored version for `(role, timestamp)`, or the baseline when no
    /// timestamp is given or no such version exists. Returned byte-for-byte.
    pub async fn load(
        &self,
        role: Role,
        timestamp: Option<&Timestamp>,
    ) -> Result<String, StoreError> {
        if let Some(ts) = timestamp {
            let path = self.version_path(role, ts);
            match fs::read_to_string(&path).await {
                Ok(text) => return Ok(text),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(%role, timestamp = %ts, "no stored version, using baseline");
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.load_baseline(role).await
    }

    pub async fn load_baseline(&self, role: Role) -> Result<String, StoreError> {
        let path = self.baseline_path(role);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::BaselineMissing { role, path })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Writes a version, replacing any earlier write for the same pair.
    pub async fn save(
        &self,
        role: Role,
        timestamp: &Timestamp,
        text: &str,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.history_dir).await?;
        let path = self.version_path(role, timestamp);
        fs::write(&path, text).await?;
        tracing::info!(%role, %timestamp, path = %path.display(), "saved prompt version");
        Ok(())
    }

    pub async fn has_version(&self, role: Role, timestamp: &Timestamp) -> bool {
        fs::metadata(self.version_path(role, timestamp)).await.is_ok()
    }

    /// Every valid timestamp embedded in a history file name, deduplicated
    /// across roles. Names without a real date-time are skipped.
    pub async fn list_timestamps(&self) -> Result<BTreeSet<Timestamp>, StoreError> {
        let mut out = BTreeSet::new();
        if fs::metadata(&self.history_dir).await.is_err() {
            return Ok(out);
        }

        let mut entries = fs::read_dir(&self.history_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_name = entry.file_name();
            if !fs::metadata(&path).await?.is_file() {
                continue;
            }
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(found) = TIMESTAMP_PATTERN.captures(name).and_then(|c| c.get(1)) else {
                continue;
            };
            match Timestamp::parse(found.as_str()) {
                Ok(ts) => {
                    out.insert(ts);
                }
                Err(err) => tracing::debug!(file = %name, "skipping history entry: {err}"),
            }
        }

        Ok(out)
    }

    pub async fn latest(&self) -> Result<Option<Timestamp>, StoreError> {
        Ok(self.list_timestamps().await?.into_iter().next_back())
    }

    /// Uniform pick over the known history.
    pub async fn random<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Option<Timestamp>, StoreError> {
        Ok(self.list_timestamps().await?.into_iter().choose(rng))
    }

    fn baseline_path(&self, role: Role) -> PathBuf {
        self.baseline_dir.join(format!("{role}_prompt.txt"))
    }

    fn version_path(&self, role: Role, timestamp: &Timestamp) -> PathBuf {
        self.history_dir.join(format!("{role}_prompt_{timestamp}.txt"))
    }
}
