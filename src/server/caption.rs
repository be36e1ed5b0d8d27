//! Image captioning route handler.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::types::CaptionResponse;

use super::AppState;

/// Multipart field carrying the uploaded image
const IMAGE_FIELD: &str = "image";

/// POST /generate-caption
///
/// Accepts a multipart upload with an `image` file field and returns a
/// one-sentence description of it.
pub async fn generate_caption(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<CaptionResponse>> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let bytes = read_image_field(&mut multipart).await?;

    let image = image::load_from_memory(&bytes)
        .map_err(|e| AppError::BadRequest(format!("Failed to decode image: {e}")))?
        .to_rgb8();

    info!(
        width = image.width(),
        height = image.height(),
        bytes = bytes.len(),
        "Generating caption"
    );

    let captioner = state.captioner.clone();
    let caption = tokio::task::spawn_blocking(move || captioner.caption(&image))
        .await
        .map_err(|e| AppError::Internal(format!("Join error: {e}")))??;

    debug!(%caption, "Caption ready");
    Ok(Json(CaptionResponse { caption }))
}

/// Returns the bytes of the first `image` field, skipping any other fields
async fn read_image_field(multipart: &mut Multipart) -> Result<Bytes> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()));
        }
    }

    Err(AppError::BadRequest(format!(
        "Missing '{IMAGE_FIELD}' file in request"
    )))
}
