//! Application state for the API server

use crate::{BatchCaptioner, Config};
use std::sync::Arc;

/// Shared state handed to every route handler
///
/// Cloned per request; both fields are `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// The captioning engine
    pub captioner: Arc<BatchCaptioner>,

    /// Static configuration (read-only; runtime settings live on the captioner)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(captioner: Arc<BatchCaptioner>, config: Arc<Config>) -> Self {
        Self { captioner, config }
    }
}
