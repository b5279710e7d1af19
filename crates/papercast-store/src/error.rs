//! Error types for the file-backed stores.

use std::path::PathBuf;

use papercast_schema::{Role, Timestamp, TimestampError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Configuration error: the checked-in default instruction is gone.
    #[error("baseline prompt for {role} not found at {}", path.display())]
    BaselineMissing { role: Role, path: PathBuf },

    #[error("no podcast state recorded for {0}")]
    StateNotFound(Timestamp),

    #[error("cannot attach feedback: no podcast state recorded for {0}")]
    MissingState(Timestamp),

    #[error(transparent)]
    InvalidTimestamp(#[from] TimestampError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
