//! Artifact sink tests against a mock Telegram Bot API server.

use std::io::Write;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screenreel::config::TelegramConfig;
use screenreel::error::RecorderError;
use screenreel::upload::TelegramSink;

fn sink_for(server_uri: &str) -> TelegramSink {
    TelegramSink::new(&TelegramConfig {
        bot_token: "test-token".into(),
        chat_id: "4242".into(),
        api_base: server_uri.into(),
    })
}

fn temp_video() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"not really mp4 but the sink does not care").unwrap();
    (dir, path)
}

#[tokio::test]
async fn accepted_upload_yields_ok_receipt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendVideo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 7 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, video) = temp_video();
    let receipt = sink_for(&server.uri())
        .upload(&video, "caption")
        .await
        .unwrap();

    assert!(receipt.ok);
    // The local file is untouched by delivery.
    assert!(video.exists());
}

#[tokio::test]
async fn api_rejection_is_reported_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendVideo"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, video) = temp_video();
    let receipt = sink_for(&server.uri())
        .upload(&video, "caption")
        .await
        .unwrap();

    assert!(!receipt.ok);
    assert!(receipt.diagnostic.contains("Unauthorized"));
    assert!(video.exists());
}

#[tokio::test]
async fn transport_failure_is_retried_then_surfaced() {
    // Nothing listens here; every attempt fails at the transport level.
    let sink = sink_for("http://127.0.0.1:9").with_retry_attempts(2);
    let (_dir, video) = temp_video();

    let err = sink.upload(&video, "caption").await.unwrap_err();
    assert!(matches!(err, RecorderError::Upload { .. }));
    assert!(video.exists());
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let server = MockServer::start().await;
    let err = sink_for(&server.uri())
        .upload(std::path::Path::new("/nonexistent/clip.mp4"), "caption")
        .await
        .unwrap_err();
    assert!(matches!(err, RecorderError::Io { .. }));
}
