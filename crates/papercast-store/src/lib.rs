//! File-backed persistence: versioned prompts, podcast states and votes.

pub mod error;
pub mod prompt_store;
pub mod state_store;
pub mod vote_store;

pub use error::StoreError;
pub use prompt_store::PromptStore;
pub use state_store::PodcastStateStore;
pub use vote_store::{VoteStore, VoteTally};
