//! Item intake, inspection, selection and caption edits.

use super::{CaptionRequest, SelectionRequest, attachment};
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::types::{BatchItem, ImageSource, ItemId};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// MIME type used when neither the part nor the extension tells us more
const FALLBACK_MIME: &str = "application/octet-stream";

/// GET /items - List every item in insertion order
pub async fn list_items(State(state): State<AppState>) -> Json<Vec<BatchItem>> {
    Json(state.captioner.items().await)
}

/// GET /items/:id - Get single item
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<Json<BatchItem>> {
    let item = state.captioner.item(id).await.ok_or(Error::NotFound(id))?;
    Ok(Json(item))
}

/// GET /items/:id/image - Source image bytes, served as the item's preview
pub async fn get_item_image(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<Response> {
    let item = state.captioner.item(id).await.ok_or(Error::NotFound(id))?;
    let content_type = HeaderValue::from_str(&item.image.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_MIME));

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        item.image.bytes.clone(),
    )
        .into_response())
}

/// POST /items - Upload images (multipart/form-data) as a new batch
///
/// Every part that carries a file name and an `image/*` type becomes one
/// item, in upload order. Other parts are ignored. The previous batch is
/// replaced.
pub async fn upload_items(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut images = Vec::new();
    let mut ignored = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidUpload(e.body_text()))?
    {
        let Some(file_name) = field.file_name().filter(|name| !name.is_empty()) else {
            continue;
        };
        let file_name = file_name.to_string();
        let mime_type = resolve_mime(field.content_type(), &file_name);

        if !mime_type.starts_with("image/") {
            tracing::debug!(file_name = %file_name, mime_type = %mime_type, "Ignoring non-image upload");
            ignored += 1;
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidUpload(e.body_text()))?;
        images.push(ImageSource::new(file_name, mime_type, bytes.to_vec()));
    }

    if images.is_empty() {
        return Err(Error::InvalidUpload(
            "no image files in upload".to_string(),
        ));
    }

    let items = state.captioner.load_batch(images).await?;
    tracing::info!(items = items.len(), ignored, "Batch uploaded");

    Ok((StatusCode::CREATED, Json(items)).into_response())
}

/// PUT /items/:id/caption - Replace the caption of a captioned item
pub async fn set_item_caption(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
    Json(request): Json<CaptionRequest>,
) -> Result<Json<BatchItem>> {
    let item = state.captioner.set_caption(id, request.caption).await?;
    Ok(Json(item))
}

/// POST /items/:id/toggle - Flip the selection flag
pub async fn toggle_item(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<Json<BatchItem>> {
    let item = state.captioner.toggle_selected(id).await?;
    Ok(Json(item))
}

/// GET /items/:id/caption.txt - Download one caption as a text file
pub async fn export_item_caption(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<Response> {
    let file = state.captioner.export_item(id).await?;
    Ok(attachment(file))
}

/// POST /selection - Select or deselect every finished item
pub async fn select_all(
    State(state): State<AppState>,
    Json(request): Json<SelectionRequest>,
) -> impl IntoResponse {
    let changed = state.captioner.select_all(request.selected).await;
    Json(json!({ "selected": request.selected, "changed": changed }))
}

/// Declared part type, or a guess from the extension when absent or generic
fn resolve_mime(declared: Option<&str>, file_name: &str) -> String {
    match declared {
        Some(mime) if !mime.is_empty() && mime != FALLBACK_MIME => mime.to_string(),
        _ => mime_from_extension(file_name).to_string(),
    }
}

fn mime_from_extension(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        _ => FALLBACK_MIME,
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_image_type_wins() {
        assert_eq!(resolve_mime(Some("image/png"), "photo.jpg"), "image/png");
    }

    #[test]
    fn generic_type_falls_back_to_extension() {
        assert_eq!(
            resolve_mime(Some("application/octet-stream"), "Photo.JPEG"),
            "image/jpeg"
        );
        assert_eq!(resolve_mime(None, "scan.webp"), "image/webp");
    }

    #[test]
    fn unknown_extension_is_not_an_image() {
        assert_eq!(resolve_mime(None, "notes.txt"), FALLBACK_MIME);
        assert_eq!(resolve_mime(None, "noext"), FALLBACK_MIME);
    }
}
