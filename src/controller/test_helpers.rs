//! Shared test helpers for creating BatchCaptioner instances in tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::annotator::Annotator;
use crate::config::Config;
use crate::controller::BatchCaptioner;
use crate::error::AnnotateError;
use crate::types::{BatchItem, CaptionLength, ImageSource};

/// Credential configured on test captioners
pub(crate) const TEST_KEY: &str = "test-key";

/// One recorded call to [`ScriptedAnnotator`]
#[derive(Clone, Debug)]
pub(crate) struct AnnotateCall {
    pub(crate) file_name: String,
    pub(crate) length: CaptionLength,
    pub(crate) credential: String,
    pub(crate) at: tokio::time::Instant,
}

/// Annotator replaying a fixed script of results
///
/// Once the script is exhausted every call returns `exhausted`, or a caption
/// derived from the file name when that is `None`.
pub(crate) struct ScriptedAnnotator {
    script: Mutex<VecDeque<Result<String, AnnotateError>>>,
    exhausted: Option<AnnotateError>,
    calls: Mutex<Vec<AnnotateCall>>,
}

impl ScriptedAnnotator {
    /// Every call succeeds
    pub(crate) fn captions() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    /// Replay `script`, then succeed
    pub(crate) fn scripted(script: Vec<Result<String, AnnotateError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            exhausted: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Every call fails with `error`
    pub(crate) fn failing(error: AnnotateError) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            exhausted: Some(error),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<AnnotateCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// Caption the scripted annotator produces for `file_name`
pub(crate) fn caption_for(file_name: &str) -> String {
    format!("A test photograph named {file_name}.")
}

/// Rate-limit error shaped like the Gemini quota response
pub(crate) fn rate_limited() -> AnnotateError {
    AnnotateError::RateLimited {
        message: "429 RESOURCE_EXHAUSTED: quota exceeded".to_string(),
    }
}

#[async_trait]
impl Annotator for ScriptedAnnotator {
    async fn annotate(
        &self,
        image: &ImageSource,
        length: CaptionLength,
        credential: &str,
    ) -> Result<String, AnnotateError> {
        self.calls.lock().unwrap().push(AnnotateCall {
            file_name: image.file_name.clone(),
            length,
            credential: credential.to_string(),
            at: tokio::time::Instant::now(),
        });

        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.exhausted {
            Some(error) => Err(error.clone()),
            None => Ok(caption_for(&image.file_name)),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Default configuration with a test credential
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.annotator.api_key = Some(TEST_KEY.to_string());
    config
}

/// Captioner wired to `annotator` with [`test_config`]
pub(crate) fn create_test_captioner(annotator: Arc<ScriptedAnnotator>) -> BatchCaptioner {
    BatchCaptioner::with_annotator(test_config(), annotator)
}

/// Small fake images named `names`
pub(crate) fn images(names: &[&str]) -> Vec<ImageSource> {
    names
        .iter()
        .map(|name| ImageSource::new(*name, "image/jpeg", name.as_bytes().to_vec()))
        .collect()
}

/// Load a batch of fake images into `captioner`
pub(crate) async fn load(captioner: &BatchCaptioner, names: &[&str]) -> Vec<BatchItem> {
    captioner.load_batch(images(names)).await.unwrap()
}
