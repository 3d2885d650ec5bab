//! Integration tests for the HTTP surface: catalog listing, range streaming,
//! HLS and subtitle serving, uploads.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use mediadrop::catalog::MediaCatalog;
use mediadrop::config::Config;
use mediadrop::ingest::{IngestQueue, Pipeline, PipelineSettings};
use mediadrop::probe::ProbeReport;
use mediadrop::server::{create_router, AppContext};
use mediadrop::tools::ToolResult;
use mediadrop::transcode::{MediaTool, TranscodeMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// A media tool for router tests; routes never invoke it.
struct InertTool;

impl MediaTool for InertTool {
    fn probe(&self, _src: &Path) -> ToolResult<ProbeReport> {
        Ok(ProbeReport::default())
    }
    fn transcode(&self, _src: &Path, _dst: &Path, _mode: TranscodeMode) -> ToolResult<()> {
        Ok(())
    }
    fn segment(&self, _src: &Path, _hls_dir: &Path) -> ToolResult<()> {
        Ok(())
    }
    fn extract_subtitle(&self, _src: &Path, _dst: &Path) -> ToolResult<()> {
        Ok(())
    }
}

struct TestApp {
    _dir: TempDir,
    intake: PathBuf,
    media: PathBuf,
    router: axum::Router,
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let intake = dir.path().join("intake");
    let media = dir.path().join("media");
    std::fs::create_dir_all(&intake).unwrap();
    std::fs::create_dir_all(&media).unwrap();

    let mut config = Config::default();
    config.intake.dir = intake.clone();
    config.media.dir = media.clone();

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(InertTool),
        PipelineSettings {
            media_dir: media.clone(),
            extensions: config.intake.extensions.clone(),
            target_audio_codec: config.transcode.audio_codec.clone(),
            poll_interval: Duration::from_millis(10),
        },
    ));
    let queue = IngestQueue::start(pipeline);

    let ctx = AppContext {
        config: Arc::new(config),
        catalog: Arc::new(MediaCatalog::new(media.clone())),
        queue,
    };

    TestApp {
        _dir: dir,
        intake,
        media,
        router: create_router(ctx),
    }
}

/// Create a fully published title: progressive file, caption, HLS set.
fn publish_title(media: &Path, title: &str, video_bytes: &[u8]) {
    let dir = media.join(title);
    std::fs::create_dir_all(dir.join("hls")).unwrap();
    std::fs::write(dir.join(format!("{}.mp4", title)), video_bytes).unwrap();
    std::fs::write(dir.join(format!("{}.vtt", title)), b"WEBVTT\n").unwrap();
    std::fs::write(dir.join("hls/index.m3u8"), b"#EXTM3U\n").unwrap();
    std::fs::write(dir.join("hls/segment_000.ts"), b"segment-bytes").unwrap();
}

async fn get(router: &axum::Router, uri: &str) -> axum::response::Response {
    router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn get_range(router: &axum::Router, uri: &str, range: &str) -> axum::response::Response {
    router
        .clone()
        .oneshot(
            Request::get(uri)
                .header(header::RANGE, range)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

fn header_str<'a>(response: &'a axum::response::Response, name: header::HeaderName) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn health_check_responds() {
    let app = test_app();
    let response = get(&app.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn full_video_request_streams_entire_file() {
    let app = test_app();
    let video: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    publish_title(&app.media, "movie", &video);

    let response = get(&app.router, "/video/movie").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "video/mp4");
    assert_eq!(header_str(&response, header::ACCEPT_RANGES), "bytes");
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), "1000");

    let body = body_bytes(response).await;
    assert_eq!(body, video);
}

#[tokio::test]
async fn range_request_returns_exact_slice() {
    let app = test_app();
    let video: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    publish_title(&app.media, "movie", &video);

    let response = get_range(&app.router, "/video/movie", "bytes=0-99").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        "bytes 0-99/1000"
    );
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), "100");
    let body = body_bytes(response).await;
    assert_eq!(body, &video[0..100]);
}

#[tokio::test]
async fn open_ended_range_runs_to_eof() {
    let app = test_app();
    let video: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    publish_title(&app.media, "movie", &video);

    let response = get_range(&app.router, "/video/movie", "bytes=500-").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        "bytes 500-999/1000"
    );
    let body = body_bytes(response).await;
    assert_eq!(body, &video[500..]);
}

#[tokio::test]
async fn range_end_is_clamped_to_file_size() {
    let app = test_app();
    publish_title(&app.media, "movie", &vec![7u8; 1000]);

    let response = get_range(&app.router, "/video/movie", "bytes=0-9999").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        "bytes 0-999/1000"
    );
    assert_eq!(body_bytes(response).await.len(), 1000);
}

#[tokio::test]
async fn suffix_range_serves_tail() {
    let app = test_app();
    let video: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    publish_title(&app.media, "movie", &video);

    let response = get_range(&app.router, "/video/movie", "bytes=-100").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        "bytes 900-999/1000"
    );
    let body = body_bytes(response).await;
    assert_eq!(body, &video[900..]);
}

#[tokio::test]
async fn malformed_range_is_rejected() {
    let app = test_app();
    publish_title(&app.media, "movie", b"0123456789");

    for bad in ["bytes=abc-def", "0-5", "bytes=-"] {
        let response = get_range(&app.router, "/video/movie", bad).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "header: {}", bad);
    }
}

#[tokio::test]
async fn range_beyond_eof_is_unsatisfiable() {
    let app = test_app();
    publish_title(&app.media, "movie", &vec![0u8; 1000]);

    let response = get_range(&app.router, "/video/movie", "bytes=1500-").await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn media_listing_is_most_recent_first() {
    let app = test_app();
    publish_title(&app.media, "older", b"a");
    std::thread::sleep(Duration::from_millis(20));
    publish_title(&app.media, "newer", b"b");

    let response = get(&app.router, "/media").await;
    assert_eq!(response.status(), StatusCode::OK);
    let titles: Vec<String> = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(titles, vec!["newer".to_string(), "older".to_string()]);
}

#[tokio::test]
async fn latest_video_is_served_without_a_title() {
    let app = test_app();
    publish_title(&app.media, "older", b"old-bytes");
    std::thread::sleep(Duration::from_millis(20));
    publish_title(&app.media, "newer", b"new-bytes");

    let response = get(&app.router, "/video").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"new-bytes");
}

#[tokio::test]
async fn unknown_title_is_not_found() {
    let app = test_app();
    publish_title(&app.media, "movie", b"bytes");

    let response = get(&app.router, "/video/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_catalog_is_not_found() {
    let app = test_app();
    let response = get(&app.router, "/video").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_reports_artifacts() {
    let app = test_app();
    publish_title(&app.media, "movie", b"bytes");

    let response = get(&app.router, "/media/movie/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    let status: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(status["ready"], true);
    assert_eq!(status["subtitle"], true);
}

#[tokio::test]
async fn delete_removes_the_whole_title() {
    let app = test_app();
    publish_title(&app.media, "movie", b"bytes");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::delete("/media/movie")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!app.media.join("movie").exists());

    // A second delete has nothing to remove.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::delete("/media/movie")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subtitle_served_when_present() {
    let app = test_app();
    publish_title(&app.media, "movie", b"bytes");

    let response = get(&app.router, "/subtitle/movie").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "text/vtt");
}

#[tokio::test]
async fn subtitle_missing_is_not_found() {
    let app = test_app();
    publish_title(&app.media, "movie", b"bytes");
    std::fs::remove_file(app.media.join("movie/movie.vtt")).unwrap();

    let response = get(&app.router, "/subtitle/movie").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hls_playlist_and_segments_are_served() {
    let app = test_app();
    publish_title(&app.media, "movie", b"bytes");

    let response = get(&app.router, "/hls/movie/index.m3u8").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::CONTENT_TYPE),
        "application/vnd.apple.mpegurl"
    );

    let response = get(&app.router, "/hls/movie/segment_000.ts").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "video/mp2t");

    let response = get(&app.router, "/hls/movie/segment_999.ts").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hls_rejects_names_outside_the_title() {
    let app = test_app();
    publish_title(&app.media, "movie", b"bytes");

    let response = get(&app.router, "/hls/movie/..%2F..%2Fmovie.mp4").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app.router, "/hls/movie/movie.mp4").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn current_reports_the_ready_title() {
    let app = test_app();
    publish_title(&app.media, "movie", b"bytes");

    let response = get(&app.router, "/current").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["processing"], false);
    assert_eq!(body["name"], "movie");
    assert_eq!(body["subtitle"], true);
}

#[tokio::test]
async fn current_reports_processing_for_incomplete_title() {
    let app = test_app();
    // Title directory exists but the progressive container does not yet.
    std::fs::create_dir_all(app.media.join("movie")).unwrap();

    let response = get(&app.router, "/current").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["processing"], true);
    assert_eq!(body["name"], "movie");
}

#[tokio::test]
async fn current_with_nothing_is_not_found() {
    let app = test_app();
    let response = get(&app.router, "/current").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn multipart_request(uri: &str, filename: &str, data: &[u8]) -> Request<Body> {
    let boundary = "test-boundary-7d93b";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn upload_saves_into_the_intake_directory() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/upload", "movie.mkv", b"fake video"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["name"], "movie.mkv");
    assert_eq!(
        std::fs::read(app.intake.join("movie.mkv")).unwrap(),
        b"fake video"
    );
}

#[tokio::test]
async fn upload_avoids_overwriting_an_existing_file() {
    let app = test_app();
    std::fs::write(app.intake.join("movie.mkv"), b"already here").unwrap();

    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/upload", "movie.mkv", b"second copy"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let name = body["name"].as_str().unwrap();
    assert_ne!(name, "movie.mkv");
    assert!(name.starts_with("movie-"));
    assert!(name.ends_with(".mkv"));
    assert_eq!(std::fs::read(app.intake.join(name)).unwrap(), b"second copy");
    assert_eq!(
        std::fs::read(app.intake.join("movie.mkv")).unwrap(),
        b"already here"
    );
}

#[tokio::test]
async fn upload_strips_directories_from_the_client_name() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(multipart_request("/upload", "../../escape.mkv", b"data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["name"], "escape.mkv");
    assert!(app.intake.join("escape.mkv").is_file());
}

#[tokio::test]
async fn upload_without_a_file_field_is_rejected() {
    let app = test_app();

    let boundary = "test-boundary-7d93b";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nx\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::post("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
