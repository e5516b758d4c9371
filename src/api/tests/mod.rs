use super::*;
use crate::controller::test_helpers::{ScriptedAnnotator, test_config};
use crate::types::Event;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

mod export;
mod system;

const BOUNDARY: &str = "caption-batch-test-boundary";

/// Router plus the engine behind it
struct TestApp {
    captioner: Arc<BatchCaptioner>,
    annotator: Arc<ScriptedAnnotator>,
    router: Router,
}

/// Test configuration without the post-success throttle
fn fast_config() -> Config {
    let mut config = test_config();
    config.batch.throttle_delay = Duration::ZERO;
    config
}

fn test_app_with(config: Config, annotator: Arc<ScriptedAnnotator>) -> TestApp {
    let captioner = Arc::new(BatchCaptioner::with_annotator(
        config.clone(),
        annotator.clone(),
    ));
    let router = create_router(captioner.clone(), Arc::new(config));
    TestApp {
        captioner,
        annotator,
        router,
    }
}

fn test_app() -> TestApp {
    test_app_with(fast_config(), ScriptedAnnotator::captions())
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, path: &str) -> Response {
        self.send(
            Request::builder()
                .uri(format!("{API_PREFIX}{path}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn post(&self, path: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(format!("{API_PREFIX}{path}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn delete(&self, path: &str) -> Response {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(format!("{API_PREFIX}{path}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn send_json(&self, method: &str, path: &str, body: Value) -> Response {
        self.send(
            Request::builder()
                .method(method)
                .uri(format!("{API_PREFIX}{path}"))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Upload `(file name, content type, bytes)` parts as a new batch
    async fn upload(&self, files: &[(&str, &str, &[u8])]) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(format!("{API_PREFIX}/items"))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(files)))
                .unwrap(),
        )
        .await
    }

    /// Upload small JPEGs named `names`
    async fn upload_images(&self, names: &[&str]) -> Vec<Value> {
        let files: Vec<(&str, &str, &[u8])> = names
            .iter()
            .map(|name| (*name, "image/jpeg", name.as_bytes()))
            .collect();
        let response = self.upload(&files).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await.as_array().unwrap().clone()
    }

    /// POST `path`, expect 202, and wait for the run to finish
    async fn run_to_completion(&self, path: &str) {
        let mut events = self.captioner.subscribe();
        let response = self.post(path).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Event::RunComplete { .. } = events.recv().await.unwrap() {
                    break;
                }
            }
        })
        .await
        .expect("run did not complete");
    }
}

fn multipart_body(files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (file_name, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn json_body(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn health_reports_version_and_phase() {
    let app = test_app();

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["annotator"], "scripted");
    assert_eq!(json["phase"], "idle");
}

#[tokio::test]
async fn routes_live_under_api_prefix() {
    let app = test_app();

    let response = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_key_guards_every_route() {
    let mut config = fast_config();
    config.api.api_key = Some("test-secret-key".to_string());
    let app = test_app_with(config, ScriptedAnnotator::captions());

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(
            Request::builder()
                .uri(format!("{API_PREFIX}/items"))
                .header("X-Api-Key", "test-secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(
            Request::builder()
                .uri(format!("{API_PREFIX}/items"))
                .header("X-Api-Key", "wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cors_headers_present_when_enabled() {
    let app = test_app();

    let response = app
        .send(
            Request::builder()
                .uri(format!("{API_PREFIX}/health"))
                .header("Origin", "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn cors_headers_absent_when_disabled() {
    let mut config = fast_config();
    config.api.cors_enabled = false;
    let app = test_app_with(config, ScriptedAnnotator::captions());

    let response = app
        .send(
            Request::builder()
                .uri(format!("{API_PREFIX}/health"))
                .header("Origin", "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn server_stops_on_shutdown_signal() {
    let mut config = fast_config();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);
    let captioner = Arc::new(BatchCaptioner::with_annotator(
        (*config).clone(),
        ScriptedAnnotator::captions(),
    ));

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server_with_shutdown(captioner, config, async move {
        stop_rx.await.ok();
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn spawn_api_server_binds_configured_address() {
    let mut config = fast_config();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let captioner = BatchCaptioner::with_annotator(config, ScriptedAnnotator::captions());

    let handle = captioner.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());
    handle.abort();
}
