//! Batch captioning engine split into focused submodules.
//!
//! The `BatchCaptioner` struct and its methods are organized by domain:
//! - [`run`] - Sequential per-item annotation with retry, backoff and throttling
//! - [`control`] - Batch intake, reset, selection, caption edits and settings
//! - [`exports`] - Archive, table and per-item caption exports

mod control;
mod exports;
mod run;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_util::sync::CancellationToken;

use crate::annotator::{Annotator, GeminiAnnotator};
use crate::config::Config;
use crate::error::Result;
use crate::registry::ItemRegistry;
use crate::types::{BatchItem, BatchPhase, BatchStats, CaptionLength, Event, ItemId};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Session settings the user changes at runtime
#[derive(Clone)]
pub(crate) struct SessionState {
    /// Caption length applied to the next run
    pub(crate) length: Arc<RwLock<CaptionLength>>,
    /// Credential for the annotation service; read once at run start
    pub(crate) credential: Arc<RwLock<Option<String>>>,
    /// Aggregate phase of the engine
    pub(crate) phase: Arc<RwLock<BatchPhase>>,
}

/// Run exclusivity and cancellation
#[derive(Clone)]
pub(crate) struct RunState {
    /// Held for the whole duration of a run; `try_lock` failing means busy
    pub(crate) guard: Arc<Mutex<()>>,
    /// Token of the current (or next) run; replaced after every reset
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
}

/// Main engine instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct BatchCaptioner {
    /// Ordered batch items; the single source of truth
    pub(crate) registry: ItemRegistry,
    /// Captioning backend
    pub(crate) annotator: Arc<dyn Annotator>,
    /// Static configuration
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Runtime-mutable settings
    pub(crate) session: SessionState,
    /// Run exclusivity and cancellation
    pub(crate) run_state: RunState,
}

impl BatchCaptioner {
    /// Create an engine backed by the Gemini API
    ///
    /// The configuration is validated first. The credential, if configured,
    /// becomes the session credential.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for invalid settings and
    /// [`Error::Network`](crate::Error::Network) if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let annotator = GeminiAnnotator::new(&config.annotator)?;
        tracing::info!(
            model = %config.annotator.model,
            endpoint = %config.annotator.endpoint,
            "Gemini annotator initialized"
        );
        Ok(Self::with_annotator(config, Arc::new(annotator)))
    }

    /// Create an engine with a custom captioning backend
    pub fn with_annotator(config: Config, annotator: Arc<dyn Annotator>) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let credential = config
            .annotator
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        let session = SessionState {
            length: Arc::new(RwLock::new(config.batch.default_length)),
            credential: Arc::new(RwLock::new(credential)),
            phase: Arc::new(RwLock::new(BatchPhase::Idle)),
        };
        let run_state = RunState {
            guard: Arc::new(Mutex::new(())),
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
        };

        tracing::debug!(annotator = annotator.name(), "Batch captioner created");

        Self {
            registry: ItemRegistry::new(event_tx.clone()),
            annotator,
            config: Arc::new(config),
            event_tx,
            session,
            run_state,
        }
    }

    /// Subscribe to engine events
    ///
    /// Each subscriber receives every event independently. A subscriber that
    /// falls more than 1000 events behind receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use caption_batch::{BatchCaptioner, Config};
    ///
    /// # fn example() -> caption_batch::Result<()> {
    /// let captioner = BatchCaptioner::new(Config::default())?;
    /// let mut events = captioner.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "caption event");
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Consistent snapshot of every item, in insertion order
    pub async fn items(&self) -> Vec<BatchItem> {
        self.registry.snapshot().await
    }

    /// Snapshot of one item
    pub async fn item(&self, id: ItemId) -> Option<BatchItem> {
        self.registry.get(id).await
    }

    /// Aggregate statistics of the current batch
    pub async fn stats(&self) -> BatchStats {
        self.registry.stats().await
    }

    /// Aggregate phase of the engine
    pub async fn phase(&self) -> BatchPhase {
        *self.session.phase.read().await
    }

    /// Name of the captioning backend (e.g. "gemini")
    pub fn annotator_name(&self) -> &'static str {
        self.annotator.name()
    }

    /// Whether a run is currently draining items
    pub fn is_running(&self) -> bool {
        self.run_state.guard.try_lock().is_err()
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // No receivers is fine; the event is dropped
        self.event_tx.send(event).ok();
    }

    pub(crate) async fn set_phase(&self, phase: BatchPhase) {
        *self.session.phase.write().await = phase;
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let captioner = Arc::new(self.clone());
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(captioner, config).await })
    }
}
