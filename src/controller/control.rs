//! Batch control: intake, reset, selection, caption edits and session settings.

use tokio_util::sync::CancellationToken;

use super::BatchCaptioner;
use crate::error::{Error, Result};
use crate::types::{
    BatchItem, BatchPhase, CaptionLength, ImageSource, ItemId, ItemPatch, ItemStatus,
};

impl BatchCaptioner {
    /// Replace the current batch with fresh `pending` items, in input order
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyBatch`] if `images` is empty
    /// - [`Error::BatchInProgress`] while a run is draining the current batch;
    ///   call [`reset`](Self::reset) first
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use caption_batch::*;
    /// # async fn example(captioner: BatchCaptioner) -> Result<()> {
    /// let bytes = std::fs::read("portrait.jpg")?;
    /// let items = captioner
    ///     .load_batch(vec![ImageSource::new("portrait.jpg", "image/jpeg", bytes)])
    ///     .await?;
    /// let summary = captioner.run_pending().await?;
    /// println!("{} of {} captioned", summary.succeeded, items.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn load_batch(&self, images: Vec<ImageSource>) -> Result<Vec<BatchItem>> {
        if images.is_empty() {
            return Err(Error::EmptyBatch("no images supplied".to_string()));
        }
        let _guard = self
            .run_state
            .guard
            .try_lock()
            .map_err(|_| Error::BatchInProgress)?;

        let items = self.registry.create_batch(images).await;
        self.set_phase(BatchPhase::Ready).await;
        Ok(items)
    }

    /// Discard every item and cancel the in-flight run, if any
    ///
    /// Image payloads are released here. A run that was draining the batch
    /// is cancelled and has released its run rights by the time this returns,
    /// so a new batch can be loaded straight away. Returns the number of
    /// discarded items.
    pub async fn reset(&self) -> usize {
        let mut cancel = self.run_state.cancel.lock().await;
        cancel.cancel();
        // The run wakes on cancellation and drops its guard promptly
        let idle = self.run_state.guard.lock().await;
        *cancel = CancellationToken::new();
        drop(cancel);

        let discarded = self.registry.reset().await;
        self.set_phase(BatchPhase::Idle).await;
        drop(idle);
        discarded
    }

    /// Set the selection flag of every terminal item
    ///
    /// Only `success` and `error` items are touched; `pending` and
    /// `processing` items keep their flag. Returns how many items changed.
    pub async fn select_all(&self, selected: bool) -> usize {
        self.registry
            .bulk_update(
                |item| item.status.is_terminal() && item.selected != selected,
                ItemPatch::select(selected),
            )
            .await
            .len()
    }

    /// Flip the selection flag of one item
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the item does not exist
    /// - [`Error::InvalidState`] if the item is `processing`
    pub async fn toggle_selected(&self, id: ItemId) -> Result<BatchItem> {
        self.registry
            .try_update(id, |item| {
                if item.status == ItemStatus::Processing {
                    return Err(invalid_state(item, "toggle"));
                }
                Ok(ItemPatch::select(!item.selected))
            })
            .await
    }

    /// Replace the caption of a successfully captioned item
    ///
    /// The edited text is what exports contain.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the item does not exist
    /// - [`Error::InvalidState`] unless the item is `success`
    pub async fn set_caption(&self, id: ItemId, caption: impl Into<String>) -> Result<BatchItem> {
        let caption = caption.into();
        self.registry
            .try_update(id, move |item| {
                if item.status != ItemStatus::Success {
                    return Err(invalid_state(item, "edit caption of"));
                }
                Ok(ItemPatch::caption(caption))
            })
            .await
    }

    /// Caption length applied to the next run
    pub async fn caption_length(&self) -> CaptionLength {
        *self.session.length.read().await
    }

    /// Change the caption length; a run in flight keeps the length it started with
    pub async fn set_caption_length(&self, length: CaptionLength) {
        *self.session.length.write().await = length;
        tracing::info!(length = length.label(), "Caption length changed");
    }

    /// Replace the session credential; `None` or blank clears it
    ///
    /// The credential is read once at the start of each run.
    pub async fn set_credential(&self, credential: Option<String>) {
        let credential = credential
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        let configured = credential.is_some();
        *self.session.credential.write().await = credential;
        tracing::info!(configured, "Annotation credential updated");
    }

    /// Whether a non-blank credential is configured
    pub async fn has_credential(&self) -> bool {
        self.session.credential.read().await.is_some()
    }
}

fn invalid_state(item: &BatchItem, operation: &str) -> Error {
    Error::InvalidState {
        id: item.id,
        operation: operation.to_string(),
        status: item.status.to_string(),
    }
}
