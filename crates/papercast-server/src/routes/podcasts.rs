use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use papercast_core::{PdfError, PodcastVariant};
use serde::Serialize;

use super::ApiError;
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Serialize)]
pub struct CreatedPodcasts {
    pub podcasts: Vec<PodcastVariant>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_podcasts))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

async fn create_podcasts(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CreatedPodcasts>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
            upload = Some(bytes);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| ApiError::bad_request("missing multipart field: file"))?;

    let podcasts = state
        .app
        .studio()
        .create_from_pdf(&bytes)
        .await
        .map_err(|err| match err.downcast_ref::<PdfError>() {
            Some(pdf) => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, pdf.to_string()),
            None => {
                tracing::error!("podcast creation failed: {err:#}");
                ApiError::new(StatusCode::BAD_GATEWAY, format!("{err:#}"))
            }
        })?;

    Ok(Json(CreatedPodcasts { podcasts }))
}
