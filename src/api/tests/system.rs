use super::*;
use tokio_stream::StreamExt;

#[tokio::test]
async fn event_stream_is_sse() {
    let app = test_app();

    let response = app.get("/events").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
}

#[tokio::test]
async fn event_stream_forwards_engine_events() {
    let app = test_app();

    // The handler has subscribed once the response exists
    let response = app.get("/events").await;
    let mut stream = response.into_body().into_data_stream();

    app.captioner.reset().await;

    let chunk = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("no event received")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(text.contains("event: batch_reset"), "got: {text}");
    assert!(text.contains(r#"data: {"type":"batch_reset"}"#), "got: {text}");
}
