//! Remote failure classification
//!
//! Decides whether a failed annotation call was throttling (retryable) or a
//! terminal remote error. Structured fields of the Google error envelope are
//! checked first; the message text is only inspected when they are absent or
//! inconclusive.

use serde::Deserialize;

use crate::error::AnnotateError;

/// gRPC status name used by Google APIs for quota exhaustion
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// What is known about a failed remote call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteFailure {
    /// HTTP status of the response, if one was received
    pub http_status: Option<u16>,
    /// `error.code` from the response body
    pub code: Option<u16>,
    /// `error.status` from the response body (e.g. "RESOURCE_EXHAUSTED")
    pub status: Option<String>,
    /// Human-readable message, reported to the user verbatim
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

impl RemoteFailure {
    /// Failure before any response arrived (connect error, timeout, ...)
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Failure described by an error response
    ///
    /// Understands the `{"error": {"code", "message", "status"}}` envelope and
    /// falls back to the raw body (or the status line) as the message.
    pub fn from_response(http_status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(ErrorEnvelope { error }) => Self {
                http_status: Some(http_status),
                code: error.code,
                message: error
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| fallback_message(http_status, body)),
                status: error.status,
            },
            Err(_) => Self {
                http_status: Some(http_status),
                message: fallback_message(http_status, body),
                ..Self::default()
            },
        }
    }
}

fn fallback_message(http_status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {http_status}")
    } else {
        format!("HTTP {http_status}: {body}")
    }
}

/// Map a remote failure onto the annotation error taxonomy
pub fn classify_failure(failure: RemoteFailure) -> AnnotateError {
    let structured = failure.http_status == Some(429)
        || failure.code == Some(429)
        || failure.status.as_deref() == Some(RESOURCE_EXHAUSTED);

    if structured || mentions_rate_limit(&failure.message) {
        AnnotateError::RateLimited {
            message: failure.message,
        }
    } else {
        AnnotateError::Remote {
            message: failure.message,
        }
    }
}

/// Message-text fallback for throttling
fn mentions_rate_limit(message: &str) -> bool {
    message.contains("429") || message.contains(RESOURCE_EXHAUSTED) || message.contains("quota")
}
