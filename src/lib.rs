//! # caption-batch
//!
//! Bulk image captioning engine backed by a vision-language model.
//!
//! A batch of images is loaded, captioned one image at a time with
//! rate-limit aware retries, reviewed and edited, then exported as a ZIP of
//! text files or a CSV table.
//!
//! ## Design Philosophy
//!
//! caption-batch is designed to be:
//! - **Sequential and polite** - One request in flight, throttled after each success
//! - **Resilient** - Quota errors are retried with exponential backoff; other failures
//!   mark the item and the batch moves on
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Library-first** - The HTTP server is a thin layer over [`BatchCaptioner`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use caption_batch::{BatchCaptioner, CaptionLength, Config, ImageSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.annotator.api_key = Some("your-gemini-key".to_string());
//!
//!     let captioner = BatchCaptioner::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = captioner.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let bytes = std::fs::read("beach.jpg")?;
//!     captioner
//!         .load_batch(vec![ImageSource::new("beach.jpg", "image/jpeg", bytes)])
//!         .await?;
//!     captioner.set_caption_length(CaptionLength::Short).await;
//!     captioner.run_pending().await?;
//!
//!     if let Some(archive) = captioner.export_archive().await? {
//!         std::fs::write(&archive.file_name, &archive.bytes)?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod annotator;
pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod registry;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use annotator::{Annotator, GeminiAnnotator};
pub use config::Config;
pub use controller::BatchCaptioner;
pub use error::{
    AnnotateError, AnnotateErrorKind, ApiError, Error, ErrorDetail, Result, ToHttpStatus,
};
pub use export::ExportFile;
pub use types::{
    BatchItem, BatchPhase, BatchStats, CaptionLength, Event, ImageSource, ItemId, ItemStatus,
    RunKind, RunSummary,
};

use std::sync::Arc;

/// Serve the API until SIGTERM or SIGINT, then discard the batch
///
/// The reset cancels any in-flight run before the server stops.
///
/// # Example
///
/// ```no_run
/// use caption_batch::{BatchCaptioner, Config};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let captioner = BatchCaptioner::new(Config::default())?;
///     caption_batch::run_with_shutdown(captioner).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(captioner: BatchCaptioner) -> Result<()> {
    let config = captioner.get_config();
    let captioner = Arc::new(captioner);

    let on_signal = {
        let captioner = Arc::clone(&captioner);
        async move {
            wait_for_signal().await;
            let discarded = captioner.reset().await;
            tracing::info!(discarded, "Shutting down");
        }
    };

    api::start_api_server_with_shutdown(captioner, config, on_signal).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
