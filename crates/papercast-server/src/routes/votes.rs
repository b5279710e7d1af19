use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use papercast_schema::Timestamp;
use papercast_store::VoteTally;
use serde::{Deserialize, Serialize};

use super::{parse_timestamp, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct VoteRequest {
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct VoteRecorded {
    pub timestamp: Timestamp,
    pub votes: u64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_votes).post(record_vote))
}

async fn get_votes(State(state): State<AppState>) -> Result<Json<VoteTally>, ApiError> {
    let tally = state.app.votes().tally().await.map_err(ApiError::internal)?;
    Ok(Json(tally))
}

async fn record_vote(
    State(state): State<AppState>,
    Json(body): Json<VoteRequest>,
) -> Result<Json<VoteRecorded>, ApiError> {
    let timestamp = parse_timestamp(&body.timestamp)?;
    let votes = state
        .app
        .votes()
        .record_vote(&timestamp)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(VoteRecorded { timestamp, votes }))
}
