use axum::{extract::State, routing::get, Json, Router};
use papercast_schema::Timestamp;
use serde::Serialize;

use super::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct TimestampList {
    pub timestamps: Vec<Timestamp>,
    pub latest: Option<Timestamp>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_timestamps))
}

async fn list_timestamps(State(state): State<AppState>) -> Result<Json<TimestampList>, ApiError> {
    let timestamps: Vec<Timestamp> = state
        .app
        .prompts()
        .list_timestamps()
        .await
        .map_err(ApiError::internal)?
        .into_iter()
        .collect();
    let latest = timestamps.last().cloned();
    Ok(Json(TimestampList { timestamps, latest }))
}
