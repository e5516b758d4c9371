//! Error types for caption-batch
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] type returned by engine and API operations
//! - The per-attempt [`AnnotateError`] taxonomy produced by annotation backends
//! - HTTP status code mapping and structured JSON error bodies for the API

use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for caption-batch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for caption-batch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_attempts")
        key: Option<String>,
    },

    /// Batch item not found in the registry
    #[error("item {0} not found")]
    NotFound(ItemId),

    /// Operation not allowed in the item's current status
    #[error("cannot {operation} item {id} while it is {status}")]
    InvalidState {
        /// The item the operation targeted
        id: ItemId,
        /// The attempted operation (e.g., "edit caption of", "toggle")
        operation: String,
        /// The status that prevents the operation
        status: String,
    },

    /// A captioning run is already draining the registry
    #[error("a captioning run is already in progress")]
    BatchInProgress,

    /// Nothing to process (empty batch or empty selection)
    #[error("nothing to process: {0}")]
    EmptyBatch(String),

    /// Uploaded content could not be accepted
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Archive construction failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Failure of a single annotation attempt
///
/// Returned by [`Annotator`](crate::annotator::Annotator) implementations. Only
/// [`AnnotateError::RateLimited`] is retried by the batch controller; every other
/// variant is terminal for the item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotateError {
    /// Missing credential; no remote call was made
    #[error("{0}")]
    Config(String),

    /// The remote service signalled throttling or quota exhaustion
    #[error("{message}")]
    RateLimited {
        /// Remote error message, verbatim
        message: String,
    },

    /// The remote call succeeded but produced no caption text
    #[error("No caption was generated.")]
    EmptyResult,

    /// Any other remote failure (network, malformed response, server error)
    #[error("{message}")]
    Remote {
        /// Remote error message, verbatim
        message: String,
    },
}

impl AnnotateError {
    /// Machine-readable kind, used in events and logs
    pub fn kind(&self) -> AnnotateErrorKind {
        match self {
            AnnotateError::Config(_) => AnnotateErrorKind::Config,
            AnnotateError::RateLimited { .. } => AnnotateErrorKind::RateLimited,
            AnnotateError::EmptyResult => AnnotateErrorKind::EmptyResult,
            AnnotateError::Remote { .. } => AnnotateErrorKind::Remote,
        }
    }
}

/// Discriminant of [`AnnotateError`] without the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotateErrorKind {
    /// Missing credential
    Config,
    /// Throttling / quota exhaustion
    RateLimited,
    /// No text returned
    EmptyResult,
    /// Generic remote failure
    Remote,
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "item_not_found",
///     "message": "item 12 not found",
///     "details": { "item_id": 12 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "item_not_found", "batch_in_progress")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::InvalidUpload(_) => 400,
            Error::EmptyBatch(_) => 422,

            Error::NotFound(_) => 404,

            Error::InvalidState { .. } => 409,
            Error::BatchInProgress => 409,

            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::Archive(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // External service errors
            Error::Network(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::NotFound(_) => "item_not_found",
            Error::InvalidState { .. } => "invalid_state",
            Error::BatchInProgress => "batch_in_progress",
            Error::EmptyBatch(_) => "empty_batch",
            Error::InvalidUpload(_) => "invalid_upload",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Archive(_) => "archive_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::NotFound(id) => Some(serde_json::json!({ "item_id": id })),
            Error::InvalidState { id, status, .. } => Some(serde_json::json!({
                "item_id": id,
                "status": status,
            })),
            _ => None,
        };

        Self {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
