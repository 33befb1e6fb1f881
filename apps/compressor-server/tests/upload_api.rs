#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Upload endpoint tests against a real Axum Router and a mock shrink service

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::Router;
use compressor::pdf::MultipartForm;
use compressor::{ApiKey, CompressionCounter, Compressor, CompressorConfig, TlsRoots};
use compressor_server::{AppState, router};
use httpmock::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tower::ServiceExt;

fn app(server: &MockServer, upload_dir: &Path, pdf_credentials: &str) -> Router {
    let mut config = CompressorConfig::default();
    config.tinypng.web_endpoint = server.url("/web");
    config.tinypng.api_endpoint = server.base_url();
    config.ilovepdf.credentials = ApiKey::new(pdf_credentials);
    config.ilovepdf.api_endpoint = server.base_url();
    config.transport.allow_insecure_http = true;
    config.transport.tls_roots = TlsRoots::Webpki;
    config.transport.retry_delay = Duration::from_millis(1);

    let compressor = Compressor::from_config(&config, CompressionCounter::new()).unwrap();
    router(
        AppState {
            compressor,
            upload_dir: upload_dir.to_path_buf(),
        },
        16 * 1024 * 1024,
    )
}

fn upload_request(form: &MultipartForm) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/compress")
        .header(header::CONTENT_TYPE, form.content_type())
        .body(Body::from(form.encode()))
        .unwrap()
}

/// Every stored upload named `name`, one per upload directory
fn stored_uploads(upload_dir: &Path, name: &str) -> Vec<PathBuf> {
    std::fs::read_dir(upload_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path().join(name))
        .filter(|path| path.is_file())
        .collect()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app(&server, dir.path(), "").oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["compression_count"], 0);
}

#[tokio::test]
async fn test_image_upload_reports_sizes() {
    let server = MockServer::start();
    let shrink = server.mock(|when, then| {
        when.method(POST).path("/web/shrink").body("0123456789");
        then.status(201)
            .header("Location", server.url("/output/1"))
            .header("Compression-Count", "3");
    });
    server.mock(|when, then| {
        when.method(GET).path("/output/1");
        then.status(200).body("0123");
    });
    let dir = tempfile::tempdir().unwrap();
    let form = MultipartForm::new().file(
        "file",
        "photo.png",
        "image/png",
        bytes::Bytes::from_static(b"0123456789"),
    );

    let response = app(&server, dir.path(), "")
        .oneshot(upload_request(&form))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["before"], 10);
    assert_eq!(body["after"], 4);
    let stored = stored_uploads(dir.path(), "photo.png");
    assert_eq!(stored.len(), 1);
    assert_eq!(std::fs::read(&stored[0]).unwrap(), b"0123");
    shrink.assert_calls(1);
}

#[tokio::test]
async fn test_traversal_name_is_confined_to_upload_dir() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/web/shrink");
        then.status(201).header("Location", server.url("/output/2"));
    });
    server.mock(|when, then| {
        when.method(GET).path("/output/2");
        then.status(200).body("x");
    });
    let dir = tempfile::tempdir().unwrap();
    let form = MultipartForm::new().file(
        "file",
        "../../escape.png",
        "image/png",
        bytes::Bytes::from_static(b"abc"),
    );

    let response = app(&server, dir.path(), "")
        .oneshot(upload_request(&form))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = stored_uploads(dir.path(), "escape.png");
    assert_eq!(stored.len(), 1);
    assert!(stored[0].starts_with(dir.path()));
}

#[tokio::test]
async fn test_service_error_is_500_with_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/web/shrink");
        then.status(415).json_body(serde_json::json!({
            "error": "Unsupported media type",
            "message": "File type is not supported"
        }));
    });
    let dir = tempfile::tempdir().unwrap();
    let form = MultipartForm::new().file(
        "file",
        "notes.png",
        "image/png",
        bytes::Bytes::from_static(b"plain text"),
    );

    let response = app(&server, dir.path(), "")
        .oneshot(upload_request(&form))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(
        body["data"],
        "File type is not supported (HTTP 415/Unsupported media type)"
    );
}

#[tokio::test]
async fn test_missing_file_field() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let form = MultipartForm::new().text("level", "low");

    let response = app(&server, dir.path(), "")
        .oneshot(upload_request(&form))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["data"], "No file uploaded");
}

#[tokio::test]
async fn test_unwritable_upload_dir() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let form = MultipartForm::new().file(
        "file",
        "cat.png",
        "image/png",
        bytes::Bytes::from_static(b"abc"),
    );

    let response = app(&server, &missing, "")
        .oneshot(upload_request(&form))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["data"], "Upload file not moved");
}

#[tokio::test]
async fn test_pdf_without_credentials() {
    let server = MockServer::start();
    let dir = tempfile::tempdir().unwrap();
    let form = MultipartForm::new().file(
        "file",
        "report.pdf",
        "application/pdf",
        bytes::Bytes::from_static(b"%PDF-1.7"),
    );

    let response = app(&server, dir.path(), "")
        .oneshot(upload_request(&form))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["data"],
        "The key for ILovePDF API is not installed"
    );
}

#[tokio::test]
async fn test_pdf_upload_uses_requested_level() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/start/compress");
        then.status(200).json_body(serde_json::json!({
            "server": server.base_url(),
            "task": "t-9",
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/v1/upload");
        then.status(200)
            .json_body(serde_json::json!({ "server_filename": "srv.pdf" }));
    });
    let process = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/process")
            .body_includes("\"compression_level\":\"low\"");
        then.status(200).body("{}");
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/download/t-9");
        then.status(200).body("%PDF");
    });
    let dir = tempfile::tempdir().unwrap();
    let form = MultipartForm::new().text("level", "low").file(
        "file",
        "report.pdf",
        "application/pdf",
        bytes::Bytes::from_static(b"%PDF-1.7 original"),
    );

    let response = app(&server, dir.path(), "proj:secret")
        .oneshot(upload_request(&form))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["before"], 17);
    assert_eq!(body["after"], 4);
    process.assert_calls(1);
}

#[tokio::test]
async fn test_concurrent_same_name_uploads_keep_their_own_sizes() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/web/shrink");
        then.status(201).header("Location", server.url("/output/3"));
    });
    server.mock(|when, then| {
        when.method(GET).path("/output/3");
        then.status(200).body("tiny");
    });
    let dir = tempfile::tempdir().unwrap();
    let app = app(&server, dir.path(), "");
    let large = MultipartForm::new().file(
        "file",
        "image.jpg",
        "image/jpeg",
        bytes::Bytes::from_static(b"0123456789abcdef"),
    );
    let small = MultipartForm::new().file(
        "file",
        "image.jpg",
        "image/jpeg",
        bytes::Bytes::from_static(b"012345"),
    );

    let (first, second) = tokio::join!(
        app.clone().oneshot(upload_request(&large)),
        app.oneshot(upload_request(&small)),
    );

    let first = json_body(first.unwrap()).await;
    let second = json_body(second.unwrap()).await;
    assert_eq!(first["before"], 16);
    assert_eq!(second["before"], 6);
    assert_eq!(first["after"], 4);
    assert_eq!(second["after"], 4);
    assert_eq!(stored_uploads(dir.path(), "image.jpg").len(), 2);
}
