//! Run control and progress handlers.

use crate::api::AppState;
use crate::error::Result;
use crate::types::ItemStatus;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// POST /batch/start - Caption every pending item in the background
///
/// Answers 202 once the run is claimed; progress arrives on `/events`.
pub async fn start_batch(State(state): State<AppState>) -> Result<Response> {
    let pending = state.captioner.stats().await.pending;
    let _run = state.captioner.spawn_pending().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "started": true, "items": pending })),
    )
        .into_response())
}

/// POST /batch/regenerate - Caption the selected items again
pub async fn regenerate_batch(State(state): State<AppState>) -> Result<Response> {
    let eligible = state
        .captioner
        .items()
        .await
        .iter()
        .filter(|item| item.selected && item.status != ItemStatus::Processing)
        .count();
    let _run = state.captioner.spawn_regenerate_selected().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "started": true, "items": eligible })),
    )
        .into_response())
}

/// DELETE /batch - Discard every item, cancelling the current run
pub async fn reset_batch(State(state): State<AppState>) -> impl IntoResponse {
    let discarded = state.captioner.reset().await;
    Json(json!({ "discarded": discarded }))
}

/// GET /batch/stats - Phase, run flag and per-status counts
pub async fn batch_stats(State(state): State<AppState>) -> impl IntoResponse {
    let captioner = &state.captioner;
    Json(json!({
        "phase": captioner.phase().await,
        "running": captioner.is_running(),
        "length": captioner.caption_length().await,
        "stats": captioner.stats().await,
    }))
}
