use super::*;
use crate::controller::test_helpers::caption_for;
use std::io::Read;

fn disposition(response: &Response) -> String {
    response.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn exports_are_empty_before_any_caption() {
    let app = test_app();
    app.upload_images(&["a.jpg"]).await;

    assert_eq!(
        app.get("/export/archive").await.status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.get("/export/table").await.status(),
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn archive_contains_one_text_file_per_caption() {
    let app = test_app();
    app.upload_images(&["IMG_1.jpg", "IMG_2.png"]).await;
    app.run_to_completion("/batch/start").await;

    let response = app.get("/export/archive").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/zip");
    let disposition = disposition(&response);
    assert!(disposition.starts_with("attachment; filename=\"Caption_Batch_"));
    assert!(disposition.ends_with(".zip\""));

    let bytes = body_bytes(response).await;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 2);

    let mut entry = archive.by_name("IMG_1.txt").unwrap();
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    assert_eq!(text, caption_for("IMG_1.jpg"));
}

#[tokio::test]
async fn table_lists_selected_captions() {
    let app = test_app();
    let items = app.upload_images(&["a.jpg", "b.jpg"]).await;
    app.run_to_completion("/batch/start").await;

    // Deselect b.jpg
    let second = items[1]["id"].as_u64().unwrap();
    app.post(&format!("/items/{second}/toggle")).await;

    let response = app.get("/export/table").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/csv; charset=utf-8"
    );
    assert!(disposition(&response).ends_with(".csv\""));

    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(
        text,
        format!(
            "\u{feff}Filename,Caption\n\"a.jpg\",\"{}\"",
            caption_for("a.jpg")
        )
    );
}

#[tokio::test]
async fn single_caption_download() {
    let app = test_app();
    let items = app.upload_images(&["portrait.jpeg"]).await;
    let id = items[0]["id"].as_u64().unwrap();

    let response = app.get(&format!("/items/{id}/caption.txt")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.run_to_completion("/batch/start").await;

    let response = app.get(&format!("/items/{id}/caption.txt")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        disposition(&response),
        "attachment; filename=\"portrait.txt\""
    );
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(text, caption_for("portrait.jpeg"));
}

#[tokio::test]
async fn archive_uses_edited_caption() {
    let app = test_app();
    let items = app.upload_images(&["a.jpg"]).await;
    let id = items[0]["id"].as_u64().unwrap();
    app.run_to_completion("/batch/start").await;

    app.send_json(
        "PUT",
        &format!("/items/{id}/caption"),
        serde_json::json!({ "caption": "Edited by hand." }),
    )
    .await;

    let bytes = body_bytes(app.get("/export/archive").await).await;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut text = String::new();
    archive
        .by_name("a.txt")
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "Edited by hand.");
}
