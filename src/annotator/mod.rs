//! Annotation backends
//!
//! An [`Annotator`] turns one image into one caption. The production
//! implementation is [`GeminiAnnotator`]; tests substitute scripted fakes.
//! Backends make exactly one remote call per invocation and never retry on
//! their own. Retrying is the batch controller's job.

pub mod classify;
mod gemini;
pub mod prompt;

pub use classify::{RemoteFailure, classify_failure};
pub use gemini::GeminiAnnotator;

use async_trait::async_trait;

use crate::error::AnnotateError;
use crate::types::{CaptionLength, ImageSource};

/// Message reported for every item when a run starts without a credential
pub const MISSING_CREDENTIAL: &str =
    "No API key configured. Provide a Google Gemini API key before starting a batch.";

/// One call to a captioning service
///
/// # Examples
///
/// ```no_run
/// use async_trait::async_trait;
/// use caption_batch::annotator::Annotator;
/// use caption_batch::{AnnotateError, CaptionLength, ImageSource};
///
/// struct FixedCaption;
///
/// #[async_trait]
/// impl Annotator for FixedCaption {
///     async fn annotate(
///         &self,
///         image: &ImageSource,
///         _length: CaptionLength,
///         _credential: &str,
///     ) -> Result<String, AnnotateError> {
///         Ok(format!("A photograph stored as {}.", image.file_name))
///     }
///
///     fn name(&self) -> &'static str {
///         "fixed"
///     }
/// }
/// ```
#[async_trait]
pub trait Annotator: Send + Sync {
    /// Produce a caption for `image` following the `length` profile
    ///
    /// `credential` is never empty; [`annotate_checked`] guards that before
    /// calling in.
    ///
    /// # Errors
    ///
    /// - [`AnnotateError::RateLimited`] when the service throttles
    /// - [`AnnotateError::EmptyResult`] when no text comes back
    /// - [`AnnotateError::Remote`] for every other failure
    async fn annotate(
        &self,
        image: &ImageSource,
        length: CaptionLength,
        credential: &str,
    ) -> Result<String, AnnotateError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Run one annotation attempt with the credential guard and caption cleanup
///
/// A missing or blank credential fails with [`AnnotateError::Config`] without
/// touching the backend. Successful text is reduced to a single trimmed line;
/// nothing left after trimming counts as [`AnnotateError::EmptyResult`].
pub async fn annotate_checked(
    annotator: &dyn Annotator,
    image: &ImageSource,
    length: CaptionLength,
    credential: Option<&str>,
) -> Result<String, AnnotateError> {
    let credential = match credential.map(str::trim) {
        Some(key) if !key.is_empty() => key,
        _ => return Err(AnnotateError::Config(MISSING_CREDENTIAL.to_string())),
    };

    let raw = annotator.annotate(image, length, credential).await?;
    let caption = single_line(&raw);
    if caption.is_empty() {
        return Err(AnnotateError::EmptyResult);
    }
    Ok(caption)
}

/// Collapse line breaks into single spaces and trim
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
