//! HTTP error response handling for the API
//!
//! Domain errors become JSON bodies of the form
//! `{"error": {"code", "message", "details"?}}` with a matching status.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let api_error: ApiError = self.into();
        (status_code, Json(api_error)).into_response()
    }
}

/// Explicit error bodies built in handlers are client errors
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match self.error.code.as_str() {
            "unauthorized" => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        };
        (status_code, Json(self)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemId;

    async fn body_of(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_found_becomes_404_with_item_id() {
        let response = Error::NotFound(ItemId(41)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "item_not_found");
        assert_eq!(api_error.error.details.unwrap()["item_id"], 41);
    }

    #[tokio::test]
    async fn busy_batch_becomes_409() {
        let response = Error::BatchInProgress.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_of(response).await.error.code, "batch_in_progress");
    }

    #[tokio::test]
    async fn empty_batch_becomes_422() {
        let response = Error::EmptyBatch("no pending items".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let api_error = body_of(response).await;
        assert!(api_error.error.message.contains("no pending items"));
    }

    #[tokio::test]
    async fn internal_errors_become_500() {
        let response = Error::Other("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await.error.code, "internal_error");
    }

    #[tokio::test]
    async fn validation_api_error_is_400() {
        let response = ApiError::validation("caption must not be empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await.error.code, "validation_error");
    }

    #[tokio::test]
    async fn unauthorized_api_error_is_401() {
        let response = ApiError::unauthorized("Missing X-Api-Key header").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
