//! Caption length and credential handlers.
//!
//! The credential is write-only over HTTP; reads only report whether one is set.

use super::{CaptionLengthRequest, CredentialRequest};
use crate::api::AppState;
use crate::error::ApiError;
use crate::types::CaptionLength;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

fn length_body(length: CaptionLength) -> Json<Value> {
    Json(json!({ "length": length, "label": length.label() }))
}

/// GET /settings/caption-length - Caption length for the next run
pub async fn get_caption_length(State(state): State<AppState>) -> impl IntoResponse {
    length_body(state.captioner.caption_length().await)
}

/// PUT /settings/caption-length - Change the caption length
///
/// A run already in flight keeps the length it started with.
pub async fn set_caption_length(
    State(state): State<AppState>,
    Json(request): Json<CaptionLengthRequest>,
) -> impl IntoResponse {
    state.captioner.set_caption_length(request.length).await;
    length_body(request.length)
}

/// GET /settings/credential - Whether an annotation key is configured
pub async fn get_credential(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "configured": state.captioner.has_credential().await }))
}

/// PUT /settings/credential - Replace the annotation key
pub async fn set_credential(
    State(state): State<AppState>,
    Json(request): Json<CredentialRequest>,
) -> Response {
    if request.api_key.trim().is_empty() {
        return ApiError::validation("api_key must not be blank").into_response();
    }
    state.captioner.set_credential(Some(request.api_key)).await;
    Json(json!({ "configured": true })).into_response()
}

/// DELETE /settings/credential - Forget the annotation key
pub async fn clear_credential(State(state): State<AppState>) -> StatusCode {
    state.captioner.set_credential(None).await;
    StatusCode::NO_CONTENT
}
