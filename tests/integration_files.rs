//! Integration tests for the `/files*` endpoints, exercised through the
//! full router rather than unit-testing the cache index directly.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dashforge::config::Config;
use dashforge::server::{create_router, AppContext};
use dashforge::state::CacheIndex;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

fn test_context() -> (tempfile::TempDir, tempfile::TempDir, AppContext) {
    let video_dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache_index = Arc::new(CacheIndex::new(
        video_dir.path().to_path_buf(),
        cache_dir.path().to_path_buf(),
    ));
    let config = Config {
        video_dir: video_dir.path().to_path_buf(),
        cache_dir: cache_dir.path().to_path_buf(),
        ..Config::default()
    };
    let ctx = AppContext {
        cache_index,
        config: Arc::new(config),
    };
    (video_dir, cache_dir, ctx)
}

async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn list_files_is_empty_with_no_assets() {
    let (_video_dir, _cache_dir, ctx) = test_context();
    let app = create_router(ctx);

    let response = app
        .oneshot(Request::get("/files").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    assert_eq!(json, serde_json::json!([]));
}

#[tokio::test]
async fn post_files_registers_an_available_asset() {
    let (_video_dir, _cache_dir, ctx) = test_context();
    let app = create_router(ctx);

    let body = serde_json::json!({
        "Proto": "file",
        "Path": "/videos/movie.mp4",
        "Name": "movie",
        "IsLive": false,
    });
    let response = app
        .clone()
        .oneshot(
            Request::post("/files")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(Request::get("/files").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response.into_body()).await;
    assert_eq!(json[0]["Name"], "movie");
    assert_eq!(json[0]["State"], "notGenerated");
}

#[tokio::test]
async fn post_files_rejects_unknown_protocol() {
    let (_video_dir, _cache_dir, ctx) = test_context();
    let app = create_router(ctx);

    let body = serde_json::json!({
        "Proto": "carrier-pigeon",
        "Path": "/videos/movie.mp4",
        "Name": "movie",
        "IsLive": false,
    });
    let response = app
        .oneshot(
            Request::post("/files")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_writes_the_file_and_registers_it_as_available() {
    let (video_dir, _cache_dir, ctx) = test_context();
    let app = create_router(ctx);

    let boundary = "X-BOUNDARY-X";
    let mut multipart_body = Vec::new();
    multipart_body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    multipart_body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"video\"; filename=\"clip.mp4\"\r\n",
    );
    multipart_body.extend_from_slice(b"Content-Type: video/mp4\r\n\r\n");
    multipart_body.extend_from_slice(b"not-really-a-video");
    multipart_body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let response = app
        .oneshot(
            Request::post("/files/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(multipart_body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(video_dir.path().join("clip.mp4").exists());
}
