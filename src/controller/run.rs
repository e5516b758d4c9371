//! Sequential annotation runs
//!
//! A run drains a fixed list of item ids one at a time:
//! 1. mark the item `processing`
//! 2. attempt annotation, retrying rate-limited attempts with exponential backoff
//! 3. on success store the caption, auto-select the item, then pause for the throttle delay
//! 4. on any other failure mark the item `error` and move on immediately
//!
//! Items that vanish mid-run (batch reset) are skipped without being recreated.

use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::BatchCaptioner;
use crate::annotator::annotate_checked;
use crate::error::{AnnotateError, Error, Result};
use crate::retry::{RetryNotice, format_delay, with_retry};
use crate::types::{
    BatchPhase, CaptionLength, Event, ImageSource, ItemId, ItemPatch, ItemStatus, RunKind,
    RunSummary,
};

/// Result of processing one item
#[derive(Debug, PartialEq, Eq)]
enum ItemOutcome {
    Succeeded,
    Failed,
    /// The item disappeared from the registry
    Skipped,
    /// The run was cancelled while this item was in flight
    Cancelled,
}

/// Exclusive right to drain the registry
struct RunTicket {
    _guard: OwnedMutexGuard<()>,
    cancel: CancellationToken,
}

/// Inputs fixed for the whole run
struct RunContext {
    kind: RunKind,
    length: CaptionLength,
    credential: Option<String>,
    cancel: CancellationToken,
}

/// Advisory shown while waiting out a rate limit
pub(crate) fn retry_advisory(delay: Duration) -> String {
    format!("Rate limited. Retrying in {}...", format_delay(delay))
}

impl BatchCaptioner {
    /// Caption every pending item and wait for the run to finish
    ///
    /// # Errors
    ///
    /// - [`Error::BatchInProgress`] if another run is draining the batch
    /// - [`Error::EmptyBatch`] if no item is pending
    ///
    /// Per-item failures never fail the run; they are recorded on the items.
    pub async fn run_pending(&self) -> Result<RunSummary> {
        let (ticket, ids) = self.prepare_pending().await?;
        Ok(self.execute(ticket, RunKind::Start, ids).await)
    }

    /// Start captioning every pending item in a background task
    ///
    /// Preconditions are checked before spawning, so a busy or empty batch is
    /// reported synchronously.
    pub async fn spawn_pending(&self) -> Result<JoinHandle<RunSummary>> {
        let (ticket, ids) = self.prepare_pending().await?;
        let captioner = self.clone();
        Ok(tokio::spawn(async move {
            captioner.execute(ticket, RunKind::Start, ids).await
        }))
    }

    /// Reset selected items to `pending` and caption them again
    ///
    /// Only selected items that are not `processing` are touched; everything
    /// else keeps its state. Their captions and errors are cleared first.
    ///
    /// # Errors
    ///
    /// - [`Error::BatchInProgress`] if another run is draining the batch
    /// - [`Error::EmptyBatch`] if nothing is selected
    pub async fn regenerate_selected(&self) -> Result<RunSummary> {
        let (ticket, ids) = self.prepare_regenerate().await?;
        Ok(self.execute(ticket, RunKind::Regenerate, ids).await)
    }

    /// Background variant of [`regenerate_selected`](Self::regenerate_selected)
    pub async fn spawn_regenerate_selected(&self) -> Result<JoinHandle<RunSummary>> {
        let (ticket, ids) = self.prepare_regenerate().await?;
        let captioner = self.clone();
        Ok(tokio::spawn(async move {
            captioner.execute(ticket, RunKind::Regenerate, ids).await
        }))
    }

    /// Claim exclusive run rights together with the token a reset will cancel
    ///
    /// The token lock is taken first; `reset` holds it while waiting for the guard.
    async fn acquire_run(&self) -> Result<RunTicket> {
        let cancel = self.run_state.cancel.lock().await;
        let guard = self
            .run_state
            .guard
            .clone()
            .try_lock_owned()
            .map_err(|_| Error::BatchInProgress)?;
        Ok(RunTicket {
            _guard: guard,
            cancel: cancel.clone(),
        })
    }

    async fn prepare_pending(&self) -> Result<(RunTicket, Vec<ItemId>)> {
        let ticket = self.acquire_run().await?;
        let ids: Vec<ItemId> = self
            .registry
            .snapshot()
            .await
            .iter()
            .filter(|item| item.status == ItemStatus::Pending)
            .map(|item| item.id)
            .collect();

        if ids.is_empty() {
            return Err(Error::EmptyBatch("no pending items".to_string()));
        }
        Ok((ticket, ids))
    }

    async fn prepare_regenerate(&self) -> Result<(RunTicket, Vec<ItemId>)> {
        let ticket = self.acquire_run().await?;
        let ids: Vec<ItemId> = self
            .registry
            .bulk_update(
                |item| item.selected && item.status != ItemStatus::Processing,
                ItemPatch::pending(),
            )
            .await
            .iter()
            .map(|item| item.id)
            .collect();

        if ids.is_empty() {
            return Err(Error::EmptyBatch("no selected items".to_string()));
        }
        Ok((ticket, ids))
    }

    /// Drain `ids` in order; the ticket is held until the run ends
    async fn execute(&self, ticket: RunTicket, kind: RunKind, ids: Vec<ItemId>) -> RunSummary {
        let ctx = RunContext {
            kind,
            length: *self.session.length.read().await,
            credential: self.session.credential.read().await.clone(),
            cancel: ticket.cancel.clone(),
        };

        if !ctx.cancel.is_cancelled() {
            self.set_phase(BatchPhase::Processing).await;
        }
        tracing::info!(
            kind = ?ctx.kind,
            items = ids.len(),
            length = ctx.length.label(),
            has_credential = ctx.credential.is_some(),
            "Captioning run started"
        );
        self.emit_event(Event::RunStarted {
            kind: ctx.kind,
            items: ids.clone(),
            length: ctx.length,
        });

        let mut summary = RunSummary {
            submitted: ids.len(),
            ..RunSummary::default()
        };

        for id in ids {
            if ctx.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            match self.process_item(&ctx, id).await {
                ItemOutcome::Succeeded => summary.succeeded += 1,
                ItemOutcome::Failed => summary.failed += 1,
                ItemOutcome::Skipped => summary.skipped += 1,
                ItemOutcome::Cancelled => {
                    summary.cancelled = true;
                    break;
                }
            }
        }

        if ctx.cancel.is_cancelled() {
            summary.cancelled = true;
        } else {
            let phase = if self.registry.is_empty().await {
                BatchPhase::Idle
            } else {
                BatchPhase::Complete
            };
            self.set_phase(phase).await;
        }

        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "Captioning run finished"
        );
        // Observers of RunComplete may start the next run immediately
        drop(ticket);
        self.emit_event(Event::RunComplete {
            summary: summary.clone(),
        });
        summary
    }

    async fn process_item(&self, ctx: &RunContext, id: ItemId) -> ItemOutcome {
        let Some(item) = self.registry.update(id, ItemPatch::processing()).await else {
            return ItemOutcome::Skipped;
        };
        self.publish_progress().await;

        let image: &ImageSource = &item.image;
        let attempts = with_retry(
            &self.config.batch.retry,
            |attempt| {
                async move {
                    self.registry.update(id, ItemPatch::attempt(attempt)).await;
                    annotate_checked(
                        self.annotator.as_ref(),
                        image,
                        ctx.length,
                        ctx.credential.as_deref(),
                    )
                    .await
                }
            },
            |notice| self.announce_retry(id, notice),
        );

        let result = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                tracing::info!(item_id = %id, "Run cancelled while item was in flight");
                return ItemOutcome::Cancelled;
            }
            result = attempts => result,
        };

        match result {
            Ok(caption) => {
                if self
                    .registry
                    .update(id, ItemPatch::succeeded(caption))
                    .await
                    .is_none()
                {
                    return ItemOutcome::Skipped;
                }
                tracing::info!(item_id = %id, file_name = %item.file_name, "Item captioned");
                self.publish_progress().await;

                // Throttle only after a success; a cancel here ends the run at the next item
                tokio::select! {
                    _ = ctx.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.batch.throttle_delay) => {}
                }
                ItemOutcome::Succeeded
            }
            Err(error) => self.fail_item(id, error).await,
        }
    }

    async fn fail_item(&self, id: ItemId, error: AnnotateError) -> ItemOutcome {
        let message = error.to_string();
        if self
            .registry
            .update(id, ItemPatch::failed(message.clone()))
            .await
            .is_none()
        {
            return ItemOutcome::Skipped;
        }

        tracing::error!(item_id = %id, kind = ?error.kind(), error = %message, "Item failed");
        self.emit_event(Event::ItemFailed {
            id,
            kind: error.kind(),
            error: message,
        });
        self.publish_progress().await;
        ItemOutcome::Failed
    }

    async fn announce_retry(&self, id: ItemId, notice: RetryNotice) {
        self.registry
            .update(id, ItemPatch::retrying(retry_advisory(notice.delay)))
            .await;
        self.emit_event(Event::ItemRetrying {
            id,
            retry: notice.retry,
            delay_ms: notice.delay.as_millis() as u64,
            error: notice.error,
        });
    }

    async fn publish_progress(&self) {
        let stats = self.registry.stats().await;
        self.emit_event(Event::Progress { stats });
    }
}
