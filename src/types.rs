//! Core types for caption-batch

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AnnotateErrorKind;

/// Unique identifier for a batch item
///
/// Identifiers are process-local and never reused, so an identifier from a
/// discarded batch can never address an item of a newer one.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Item status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting to be captioned
    Pending,
    /// Annotation in flight (including rate-limit backoff)
    Processing,
    /// Caption generated
    Success,
    /// Terminal failure
    Error,
}

impl ItemStatus {
    /// `success` or `error`: no further automatic transition happens
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Success | ItemStatus::Error)
    }

    /// Lowercase name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Success => "success",
            ItemStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caption granularity, applied to a whole run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionLength {
    /// 5–8 words
    OneLine,
    /// 10–15 words
    VeryShort,
    /// 20–30 words
    Short,
    /// 40–60 words
    #[default]
    Long,
    /// 80–100 words
    VeryLong,
}

impl CaptionLength {
    /// Every mode, shortest first
    pub const ALL: [CaptionLength; 5] = [
        CaptionLength::OneLine,
        CaptionLength::VeryShort,
        CaptionLength::Short,
        CaptionLength::Long,
        CaptionLength::VeryLong,
    ];

    /// Human-readable label ("one line", "very short", ...)
    pub fn label(&self) -> &'static str {
        match self {
            CaptionLength::OneLine => "one line",
            CaptionLength::VeryShort => "very short",
            CaptionLength::Short => "short",
            CaptionLength::Long => "long",
            CaptionLength::VeryLong => "very long",
        }
    }
}

/// Source image of a batch item
///
/// Owned by exactly one item through an `Arc`; dropping the item releases it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSource {
    /// Original file name including extension
    pub file_name: String,
    /// MIME type reported at intake (e.g., "image/png")
    pub mime_type: String,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

impl ImageSource {
    /// Create a new image source
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// File name without its final extension
    ///
    /// Falls back to the full name when stripping would leave nothing
    /// (e.g. ".hidden" or "noext").
    pub fn base_name(&self) -> &str {
        match self.file_name.rfind('.') {
            Some(idx) if idx > 0 => &self.file_name[..idx],
            _ => &self.file_name,
        }
    }
}

/// One unit of captioning work
#[derive(Clone, Debug, Serialize)]
pub struct BatchItem {
    /// Stable identifier
    pub id: ItemId,
    /// Source image (served as the item's preview)
    #[serde(skip)]
    pub image: Arc<ImageSource>,
    /// Original file name
    pub file_name: String,
    /// Size of the source image in bytes
    pub size_bytes: u64,
    /// Current status
    pub status: ItemStatus,
    /// Generated (possibly edited) caption; only present on `success`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Ephemeral retry notice; only present while `processing`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
    /// Terminal failure message; only present on `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Annotation attempts made in the current run
    pub attempts: u32,
    /// User selection marker for bulk actions
    pub selected: bool,
}

impl BatchItem {
    pub(crate) fn new(id: ItemId, image: ImageSource) -> Self {
        let file_name = image.file_name.clone();
        let size_bytes = image.bytes.len() as u64;
        Self {
            id,
            image: Arc::new(image),
            file_name,
            size_bytes,
            status: ItemStatus::Pending,
            caption: None,
            advisory: None,
            error: None,
            attempts: 0,
            selected: false,
        }
    }

    /// Selected and successfully captioned
    pub fn is_exportable(&self) -> bool {
        self.selected && self.status == ItemStatus::Success
    }

    /// Apply a patch, then normalise fields so they agree with the status
    pub(crate) fn apply(&mut self, patch: &ItemPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(caption) = &patch.caption {
            self.caption = caption.clone();
        }
        if let Some(advisory) = &patch.advisory {
            self.advisory = advisory.clone();
        }
        if let Some(error) = &patch.error {
            self.error = error.clone();
        }
        if let Some(attempts) = patch.attempts {
            self.attempts = attempts;
        }
        if let Some(selected) = patch.selected {
            self.selected = selected;
        }

        if self.status != ItemStatus::Success {
            self.caption = None;
        }
        if self.status != ItemStatus::Processing {
            self.advisory = None;
        }
        if self.status != ItemStatus::Error {
            self.error = None;
        }
    }
}

/// Partial update of a [`BatchItem`]
///
/// `None` leaves a field untouched; `Some(None)` clears an optional field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemPatch {
    /// New status
    pub status: Option<ItemStatus>,
    /// New caption
    pub caption: Option<Option<String>>,
    /// New advisory text
    pub advisory: Option<Option<String>>,
    /// New terminal error
    pub error: Option<Option<String>>,
    /// New attempt counter
    pub attempts: Option<u32>,
    /// New selection flag
    pub selected: Option<bool>,
}

impl ItemPatch {
    /// Picked up by the controller: `processing`, notices cleared
    pub fn processing() -> Self {
        Self {
            status: Some(ItemStatus::Processing),
            advisory: Some(None),
            error: Some(None),
            attempts: Some(0),
            ..Self::default()
        }
    }

    /// Annotation attempt number `attempt` is about to be made
    pub fn attempt(attempt: u32) -> Self {
        Self {
            attempts: Some(attempt),
            ..Self::default()
        }
    }

    /// Rate-limited, waiting before the next attempt; status is unchanged
    pub fn retrying(advisory: impl Into<String>) -> Self {
        Self {
            advisory: Some(Some(advisory.into())),
            ..Self::default()
        }
    }

    /// Captioned successfully; auto-selected
    pub fn succeeded(caption: impl Into<String>) -> Self {
        Self {
            status: Some(ItemStatus::Success),
            caption: Some(Some(caption.into())),
            advisory: Some(None),
            error: Some(None),
            selected: Some(true),
            ..Self::default()
        }
    }

    /// Terminal failure
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(ItemStatus::Error),
            error: Some(Some(error.into())),
            advisory: Some(None),
            ..Self::default()
        }
    }

    /// Back to `pending` for reprocessing; caption and error cleared
    pub fn pending() -> Self {
        Self {
            status: Some(ItemStatus::Pending),
            caption: Some(None),
            advisory: Some(None),
            error: Some(None),
            attempts: Some(0),
            ..Self::default()
        }
    }

    /// Set the selection flag
    pub fn select(selected: bool) -> Self {
        Self {
            selected: Some(selected),
            ..Self::default()
        }
    }

    /// Replace the caption of a successful item
    pub fn caption(caption: impl Into<String>) -> Self {
        Self {
            caption: Some(Some(caption.into())),
            ..Self::default()
        }
    }
}

/// Aggregate state of the engine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    /// No batch loaded
    #[default]
    Idle,
    /// Batch loaded, nothing run yet
    Ready,
    /// A run is draining items
    Processing,
    /// The last run finished
    Complete,
}

/// Which user intent started a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// All pending items
    Start,
    /// Selected items reset to pending
    Regenerate,
}

/// Batch statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Number of items in the batch
    pub total: usize,
    /// Items waiting to be captioned
    pub pending: usize,
    /// Items currently in flight
    pub processing: usize,
    /// Captioned items
    pub success: usize,
    /// Failed items
    pub error: usize,
    /// Selected items (any status)
    pub selected: usize,
    /// Selected and captioned items (what exports contain)
    pub success_selected: usize,
    /// `(success + error) / total`, 0.0 to 100.0
    pub progress: f32,
}

impl BatchStats {
    /// Compute statistics over a registry snapshot
    pub fn from_items(items: &[BatchItem]) -> Self {
        let mut stats = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            match item.status {
                ItemStatus::Pending => stats.pending += 1,
                ItemStatus::Processing => stats.processing += 1,
                ItemStatus::Success => stats.success += 1,
                ItemStatus::Error => stats.error += 1,
            }
            if item.selected {
                stats.selected += 1;
            }
            if item.is_exportable() {
                stats.success_selected += 1;
            }
        }
        stats.progress = if stats.total > 0 {
            ((stats.success + stats.error) as f32 / stats.total as f32) * 100.0
        } else {
            0.0
        };
        stats
    }
}

/// Summary of one finished run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items handed to the run
    pub submitted: usize,
    /// Items that ended in `success`
    pub succeeded: usize,
    /// Items that ended in `error`
    pub failed: usize,
    /// Items skipped because they disappeared (batch reset mid-run)
    pub skipped: usize,
    /// A reset cancelled the run
    pub cancelled: bool,
}

/// Event emitted by the engine
///
/// Subscribe via [`BatchCaptioner::subscribe`](crate::BatchCaptioner::subscribe).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new batch replaced the previous one
    BatchLoaded {
        /// Number of items
        total: usize,
    },

    /// All items were discarded
    BatchReset,

    /// A run began
    RunStarted {
        /// Start or regenerate
        kind: RunKind,
        /// Items handed to the run, in processing order
        items: Vec<ItemId>,
        /// Caption length applied to the run
        length: CaptionLength,
    },

    /// An item changed; carries the full new state
    ItemUpdated {
        /// Snapshot of the item after the change
        item: BatchItem,
    },

    /// An item was rate limited and will be retried
    ItemRetrying {
        /// Item ID
        id: ItemId,
        /// Retry number (1-based)
        retry: u32,
        /// Backoff before the next attempt, in milliseconds
        delay_ms: u64,
        /// Remote error message
        error: String,
    },

    /// An item reached a terminal failure
    ItemFailed {
        /// Item ID
        id: ItemId,
        /// Failure class
        kind: AnnotateErrorKind,
        /// Error message
        error: String,
    },

    /// Aggregate progress after a per-item transition
    Progress {
        /// Current statistics
        stats: BatchStats,
    },

    /// A run finished (or was cancelled)
    RunComplete {
        /// Run outcome
        summary: RunSummary,
    },
}
