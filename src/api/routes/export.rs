//! Export download handlers.
//!
//! Both endpoints answer 204 when no item is selected and captioned.

use super::attachment;
use crate::api::AppState;
use crate::error::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /export/archive - ZIP with one `<base-name>.txt` per exported item
pub async fn export_archive(State(state): State<AppState>) -> Result<Response> {
    Ok(match state.captioner.export_archive().await? {
        Some(file) => attachment(file),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// GET /export/table - `Filename,Caption` CSV of exported items
pub async fn export_table(State(state): State<AppState>) -> Response {
    match state.captioner.export_table().await {
        Some(file) => attachment(file),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
