use std::time::Duration;

use docflow_engine::{
    ApiSettings, ConversionApi, FailureKind, ProcessingTime, ReqwestApi, ServerSettings,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> ReqwestApi {
    ReqwestApi::new(ApiSettings {
        base_url: server.uri(),
        ..ApiSettings::default()
    })
    .expect("valid settings")
}

#[tokio::test]
async fn upload_posts_multipart_and_reads_hash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload_and_process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hash_id": "abc123",
            "already_exists": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let pdf = dir.path().join("report.pdf");
    std::fs::write(&pdf, b"%PDF-1.4 test").unwrap();

    let response = api_for(&server)
        .upload(&pdf, "report.pdf", "all")
        .await
        .expect("upload ok");
    assert_eq!(response.hash_id.as_deref(), Some("abc123"));
    assert!(!response.already_exists);

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("filename=\"report.pdf\""));
    assert!(body.contains("name=\"process_mode\""));
    assert!(body.contains("%PDF-1.4 test"));
}

#[tokio::test]
async fn upload_cache_hit_carries_result_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload_and_process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hash_id": "abc123",
            "already_exists": true,
            "filename": "report.pdf",
            "total_pages": 12,
            "processing_time": 3.5
        })))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let pdf = dir.path().join("report.pdf");
    std::fs::write(&pdf, b"%PDF").unwrap();

    let response = api_for(&server)
        .upload(&pdf, "report.pdf", "single")
        .await
        .unwrap();
    assert!(response.already_exists);
    assert_eq!(response.total_pages, Some(12));
    assert_eq!(response.processing_time, Some(ProcessingTime::Seconds(3.5)));
}

#[tokio::test]
async fn upload_error_payload_is_an_application_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload_and_process"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Invalid content type"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let pdf = dir.path().join("a.pdf");
    std::fs::write(&pdf, b"%PDF").unwrap();

    let err = api_for(&server)
        .upload(&pdf, "a.pdf", "all")
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(500));
    assert_eq!(err.message, "HTTP 500: Invalid content type");
}

#[tokio::test]
async fn upload_of_missing_file_is_an_io_error() {
    let server = MockServer::start().await;
    let err = api_for(&server)
        .upload(std::path::Path::new("/nonexistent/x.pdf"), "x.pdf", "all")
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Io);
}

#[tokio::test]
async fn progress_defaults_missing_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/progress/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "extract_progress": 100,
            "ocr_progress": 10,
            "ocr_status": "Page 2/20",
            "complete": false
        })))
        .mount(&server)
        .await;

    let progress = api_for(&server).progress("abc123").await.unwrap();
    assert_eq!(progress.extract_progress, 100.0);
    assert_eq!(progress.ocr_progress, 10.0);
    assert_eq!(progress.generate_progress, 0.0);
    assert_eq!(progress.ocr_status.as_deref(), Some("Page 2/20"));
    assert!(!progress.complete);
    assert!(progress.error.is_none());
}

#[tokio::test]
async fn progress_times_out_on_slow_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/progress/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({})),
        )
        .mount(&server)
        .await;

    let api = ReqwestApi::new(ApiSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        ..ApiSettings::default()
    })
    .unwrap();

    let err = api.progress("slow").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = api_for(&server).server_info().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Decode);
}

#[tokio::test]
async fn list_files_maps_artifact_flags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list_files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"name": "report", "hash_id": "abc123", "pages": 12,
                 "status": "completed", "has_zip": true, "has_docx": true},
                {"name": "scan", "hash_id": "def456", "is_processing": true,
                 "processing_progress": 42.5}
            ]
        })))
        .mount(&server)
        .await;

    let files = api_for(&server).list_files().await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].hash_id, "abc123");
    assert!(files[0].has_zip && files[0].has_docx && !files[0].has_json);
    assert_eq!(files[1].pages, None);
    assert!(files[1].is_processing);
    assert_eq!(files[1].processing_progress, 42.5);
}

#[tokio::test]
async fn settings_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"max_concurrent_images": 4})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/settings"))
        .and(body_json(json!({"max_concurrent_images": 8})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"max_concurrent_images": 8})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    assert_eq!(
        api.server_info().await.unwrap(),
        ServerSettings {
            max_concurrent_images: 4
        }
    );
    let saved = api
        .save_settings(ServerSettings {
            max_concurrent_images: 8,
        })
        .await
        .unwrap();
    assert_eq!(saved.max_concurrent_images, 8);
}

#[tokio::test]
async fn stop_passes_hash_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stop_processing"))
        .and(query_param("hash_id", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "not running"
        })))
        .mount(&server)
        .await;

    let reply = api_for(&server).stop("abc123").await.unwrap();
    assert!(!reply.success);
    assert_eq!(reply.message.as_deref(), Some("not running"));
}

#[tokio::test]
async fn reprocess_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reprocess"))
        .and(body_json(json!({"hash_id": "abc123", "process_mode": "all"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/reprocess"))
        .and(body_json(json!({"hash_id": "busy", "process_mode": "all"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "already processing"
        })))
        .mount(&server)
        .await;

    let api = api_for(&server);
    api.reprocess("abc123", "all").await.expect("accepted");
    let err = api.reprocess("busy", "all").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Application);
    assert_eq!(err.message, "already processing");
}

#[tokio::test]
async fn batch_download_posts_hash_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/download_batch"))
        .and(body_json(json!({"hash_ids": ["a", "b"]})))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"PK\x03\x04".to_vec(), "application/zip"),
        )
        .mount(&server)
        .await;

    let bytes = api_for(&server)
        .download_batch(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(bytes, b"PK\x03\x04");
}

#[tokio::test]
async fn artifact_download_respects_size_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download/abc123/docx"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 11]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/abc123/zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let api = ReqwestApi::new(ApiSettings {
        base_url: server.uri(),
        max_download_bytes: 10,
        ..ApiSettings::default()
    })
    .unwrap();

    let err = api.download_artifact("abc123", "docx").await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
    let err = api.download_artifact("abc123", "zip").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[test]
fn rejects_non_http_server_url() {
    let err = ReqwestApi::new(ApiSettings {
        base_url: "ftp://example.com".to_string(),
        ..ApiSettings::default()
    })
    .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
