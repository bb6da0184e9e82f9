//! Integration tests for the `/dash/*` endpoints: generation trigger,
//! stop, and served elements. The happy-path build itself is covered by
//! `conversion::controller`'s own tests — these exercise the HTTP
//! plumbing and the cache index's single-flight bookkeeping around it.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dashforge::config::Config;
use dashforge::server::{create_router, AppContext};
use dashforge::state::{AssetRecord, CacheIndex};
use dashforge_common::Protocol;
use std::sync::Arc;
use tower::ServiceExt;

fn test_context() -> (tempfile::TempDir, tempfile::TempDir, Arc<CacheIndex>, AppContext) {
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
        cache_index: cache_index.clone(),
        config: Arc::new(config),
    };
    (video_dir, cache_dir, cache_index, ctx)
}

#[tokio::test]
async fn generate_unknown_asset_returns_not_found() {
    let (_video_dir, _cache_dir, _cache_index, ctx) = test_context();
    let app = create_router(ctx);

    let response = app
        .oneshot(
            Request::post("/dash/missing/generate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generate_already_cached_asset_is_a_no_op() {
    let (_video_dir, _cache_dir, cache_index, ctx) = test_context();
    cache_index.add_available(AssetRecord {
        name: "movie".into(),
        protocol: Protocol::File,
        path: "movie.mp4".into(),
        is_live: false,
    });
    cache_index.finish_build("movie", true);
    let app = create_router(ctx);

    let response = app
        .oneshot(
            Request::post("/dash/movie/generate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn generate_while_already_in_progress_returns_conflict() {
    let (_video_dir, _cache_dir, cache_index, ctx) = test_context();
    cache_index.add_available(AssetRecord {
        name: "movie".into(),
        protocol: Protocol::File,
        path: "movie.mp4".into(),
        is_live: true,
    });
    // Claim the single-flight slot out from under the HTTP handler, the way
    // a concurrent in-flight build would.
    cache_index.try_begin_build("movie").unwrap();
    let app = create_router(ctx);

    let response = app
        .oneshot(
            Request::post("/dash/movie/generate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn stop_clears_the_cache_dir_and_is_idempotent() {
    let (_video_dir, cache_dir, cache_index, ctx) = test_context();
    cache_index.add_available(AssetRecord {
        name: "movie".into(),
        protocol: Protocol::File,
        path: "movie.mp4".into(),
        is_live: true,
    });
    cache_index.finish_build("movie", true);
    std::fs::create_dir_all(cache_dir.path().join("movie")).unwrap();
    let app = create_router(ctx);

    let response = app
        .clone()
        .oneshot(
            Request::delete("/dash/movie/generate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!cache_dir.path().join("movie").exists());

    let response = app
        .oneshot(
            Request::delete("/dash/movie/generate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn element_serves_a_cached_file_with_the_right_content_type() {
    let (_video_dir, cache_dir, _cache_index, ctx) = test_context();
    let asset_dir = cache_dir.path().join("movie");
    std::fs::create_dir_all(&asset_dir).unwrap();
    std::fs::write(asset_dir.join("manifest.mpd"), "<MPD/>").unwrap();
    let app = create_router(ctx);

    let response = app
        .oneshot(
            Request::get("/dash/movie/manifest.mpd")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/dash+xml"
    );
}

#[tokio::test]
async fn element_404s_when_the_file_does_not_exist() {
    let (_video_dir, _cache_dir, _cache_index, ctx) = test_context();
    let app = create_router(ctx);

    let response = app
        .oneshot(
            Request::get("/dash/movie/manifest.mpd")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
