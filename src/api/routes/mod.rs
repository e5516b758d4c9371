//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`items`] - Upload, inspection, selection and caption edits
//! - [`batch`] - Run control and progress
//! - [`settings`] - Caption length and credential
//! - [`export`] - Archive and table downloads
//! - [`system`] - Health and events

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::export::ExportFile;
use crate::types::CaptionLength;

mod batch;
mod export;
mod items;
mod settings;
mod system;

pub use batch::*;
pub use export::*;
pub use items::*;
pub use settings::*;
pub use system::*;

// ============================================================================
// Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /selection
#[derive(Debug, Deserialize, Serialize)]
pub struct SelectionRequest {
    /// Target selection flag for every finished item
    pub selected: bool,
}

/// Request body for PUT /items/:id/caption
#[derive(Debug, Deserialize, Serialize)]
pub struct CaptionRequest {
    /// Replacement caption
    pub caption: String,
}

/// Request body for PUT /settings/caption-length
#[derive(Debug, Deserialize, Serialize)]
pub struct CaptionLengthRequest {
    /// New caption length
    pub length: CaptionLength,
}

/// Request body for PUT /settings/credential
#[derive(Deserialize, Serialize)]
pub struct CredentialRequest {
    /// Annotation service key
    pub api_key: String,
}

impl std::fmt::Debug for CredentialRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRequest")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Serve an export as a file download
pub(crate) fn attachment(file: ExportFile) -> Response {
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        file.file_name.replace(['"', '\\'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(file.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response()
}
