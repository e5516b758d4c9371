//! Common test utilities for caption-batch end-to-end tests

#![allow(dead_code)]

use caption_batch::{Config, Event, RunSummary};
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::{MockServer, ResponseTemplate};

/// Model name configured against the mock server
pub const TEST_MODEL: &str = "gemini-e2e";

/// Credential the mock server expects
pub const TEST_KEY: &str = "e2e-secret";

/// Path of the generateContent endpoint for [`TEST_MODEL`]
pub fn generate_path() -> String {
    format!("/v1beta/models/{TEST_MODEL}:generateContent")
}

/// Successful Gemini response carrying `text`
pub fn caption_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    }))
}

/// Quota error as returned by Gemini
pub fn quota_response() -> ResponseTemplate {
    ResponseTemplate::new(429).set_body_json(json!({
        "error": {
            "code": 429,
            "message": "Resource has been exhausted (e.g. check quota).",
            "status": "RESOURCE_EXHAUSTED"
        }
    }))
}

/// Server-side failure as returned by Gemini
pub fn internal_error_response() -> ResponseTemplate {
    ResponseTemplate::new(500).set_body_json(json!({
        "error": {
            "code": 500,
            "message": "Internal error encountered.",
            "status": "INTERNAL"
        }
    }))
}

/// Configuration pointing at `server` with millisecond-scale delays
pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.annotator.endpoint = server.uri();
    config.annotator.model = TEST_MODEL.to_string();
    config.annotator.api_key = Some(TEST_KEY.to_string());
    config.annotator.request_timeout = Duration::from_secs(5);
    config.batch.throttle_delay = Duration::from_millis(10);
    config.batch.retry.initial_delay = Duration::from_millis(20);
    config.batch.retry.max_delay = Duration::from_millis(200);
    config
}

/// Collect events until the next `RunComplete`
pub async fn collect_until_complete(
    events: &mut broadcast::Receiver<Event>,
) -> (Vec<Event>, RunSummary) {
    tokio::time::timeout(Duration::from_secs(10), async {
        let mut seen = Vec::new();
        loop {
            match events.recv().await.expect("event channel closed") {
                Event::RunComplete { summary } => return (seen, summary),
                event => seen.push(event),
            }
        }
    })
    .await
    .expect("run did not complete in time")
}

/// multipart/form-data body with one part per `(file name, content type, bytes)`
pub fn multipart_body(boundary: &str, files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (file_name, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
