use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use papercast_core::{OptimizationReport, OptimizeError};
use papercast_schema::Timestamp;
use papercast_store::StoreError;
use serde::Deserialize;

use super::{parse_timestamp, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub timestamp: String,
    pub feedback: String,
    #[serde(default)]
    pub new_timestamp: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(submit_feedback))
}

/// 200 when every role was optimized, 502 when none was, 207 otherwise.
pub fn report_status(report: &OptimizationReport) -> StatusCode {
    if report.all_succeeded() {
        StatusCode::OK
    } else if report.all_failed() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::MULTI_STATUS
    }
}

async fn submit_feedback(
    State(state): State<AppState>,
    Json(body): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<OptimizationReport>), ApiError> {
    let old = parse_timestamp(&body.timestamp)?;
    let new = match body.new_timestamp.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None => Timestamp::now(),
    };
    if body.feedback.trim().is_empty() {
        return Err(ApiError::bad_request("feedback must not be empty"));
    }

    let report = state
        .app
        .driver()
        .run(&old, &new, &body.feedback)
        .await
        .map_err(|err| match err {
            OptimizeError::Store(StoreError::MissingState(_)) => {
                ApiError::new(StatusCode::NOT_FOUND, err.to_string())
            }
            OptimizeError::StaleTarget { .. } => {
                ApiError::new(StatusCode::CONFLICT, err.to_string())
            }
            other => ApiError::internal(other),
        })?;

    Ok((report_status(&report), Json(report)))
}
