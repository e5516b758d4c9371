//! System handlers: health and events.

use crate::api::AppState;
use crate::types::Event;
use axum::{
    Json,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// GET /health - Health check
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "annotator": state.captioner.annotator_name(),
        "phase": state.captioner.phase().await,
    }))
}

/// SSE event name for an engine event
fn event_name(event: &Event) -> &'static str {
    match event {
        Event::BatchLoaded { .. } => "batch_loaded",
        Event::BatchReset => "batch_reset",
        Event::RunStarted { .. } => "run_started",
        Event::ItemUpdated { .. } => "item_updated",
        Event::ItemRetrying { .. } => "item_retrying",
        Event::ItemFailed { .. } => "item_failed",
        Event::Progress { .. } => "progress",
        Event::RunComplete { .. } => "run_complete",
    }
}

/// GET /events - Server-sent events stream
///
/// Every engine event is sent as JSON with the SSE event name set to its
/// `type`. A client that falls behind receives an `error` event reporting how
/// many events were skipped; it should refetch `/items` to resynchronize.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.captioner.subscribe();
    let stream = BroadcastStream::new(receiver);

    let sse_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json_data) => Some(Ok(SseEvent::default()
                .event(event_name(&event))
                .data(json_data))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize event to JSON");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE client lagged");
            Some(Ok(SseEvent::default()
                .event("error")
                .data(json!({ "error": "lagged", "skipped": skipped }).to_string())))
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}
