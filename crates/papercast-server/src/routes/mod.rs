pub mod audio;
pub mod feedback;
pub mod podcasts;
pub mod timestamps;
pub mod votes;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use papercast_schema::Timestamp;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/timestamps", timestamps::router())
        .nest("/podcasts", podcasts::router())
        .nest("/feedback", feedback::router())
        .nest("/votes", votes::router())
}

/// JSON `{"error": ...}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("request failed: {err}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<Timestamp, ApiError> {
    Timestamp::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}
