use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::instrument;

use super::dto::IngestOutcome;
use crate::{error::AppError, forms::FormData, state::AppState};

pub fn upload_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/uploads", post(upload_image))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// POST /uploads, multipart field `image`. Stores the image on its own and
/// hands back the public path.
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, Json<IngestOutcome>), AppError> {
    let mut form = FormData::read(mp).await?;
    let image = form
        .take_file("image")
        .ok_or_else(|| AppError::Validation("no image was uploaded".into()))?;

    let outcome = state.images.ingest(image).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
