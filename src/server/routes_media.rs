//! Catalog and streaming routes.

use crate::catalog::{CatalogError, HLS_PLAYLIST};
use crate::ingest::is_supported;
use crate::server::AppContext;
use crate::streaming::{content_type_for, range_header, stream_file};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;

pub fn media_routes() -> Router<AppContext> {
    Router::new()
        .route("/media", get(list_media))
        .route("/media/:title", delete(delete_media))
        .route("/media/:title/status", get(title_status))
        .route("/current", get(current))
        .route("/video", get(stream_latest_video))
        .route("/video/:title", get(stream_video))
        .route("/subtitle", get(latest_subtitle))
        .route("/subtitle/:title", get(subtitle))
        .route("/hls/:title/:file", get(hls_file))
}

fn catalog_error(e: CatalogError) -> (StatusCode, String) {
    match e {
        CatalogError::NotFound(_) | CatalogError::Empty => (StatusCode::NOT_FOUND, e.to_string()),
        CatalogError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn list_media(
    State(ctx): State<AppContext>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    ctx.catalog
        .list_titles()
        .map(Json)
        .map_err(catalog_error)
}

async fn delete_media(
    State(ctx): State<AppContext>,
    Path(title): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    ctx.catalog.delete(&title).map_err(catalog_error)?;
    tracing::info!("Deleted title: {}", title);
    Ok(StatusCode::NO_CONTENT)
}

async fn title_status(
    State(ctx): State<AppContext>,
    Path(title): Path<String>,
) -> Result<Json<crate::catalog::TitleStatus>, (StatusCode, String)> {
    ctx.catalog.status(&title).map(Json).map_err(catalog_error)
}

#[derive(Serialize)]
struct CurrentResponse {
    processing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtitle: Option<bool>,
}

/// Status of the most recent title: ready, still processing, or nothing.
async fn current(
    State(ctx): State<AppContext>,
) -> Result<Json<CurrentResponse>, (StatusCode, String)> {
    let titles = ctx.catalog.list_titles().map_err(catalog_error)?;

    // Most recent ready title wins.
    for title in &titles {
        if let Ok(status) = ctx.catalog.status(title) {
            if status.ready {
                return Ok(Json(CurrentResponse {
                    processing: false,
                    name: Some(title.clone()),
                    subtitle: Some(status.subtitle),
                }));
            }
        }
    }

    // A title directory without its container, or a queued source, means
    // something is still being processed.
    if let Some(title) = titles.into_iter().next() {
        return Ok(Json(CurrentResponse {
            processing: true,
            name: Some(title),
            subtitle: None,
        }));
    }

    let pending = ctx.queue.pending();
    if let Some(path) = pending.into_iter().next() {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string());
        return Ok(Json(CurrentResponse {
            processing: true,
            name,
            subtitle: None,
        }));
    }

    Err((StatusCode::NOT_FOUND, "No video present".to_string()))
}

async fn stream_video(
    State(ctx): State<AppContext>,
    Path(title): Path<String>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    serve_video(&ctx, Some(&title), &headers).await
}

async fn stream_latest_video(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    serve_video(&ctx, None, &headers).await
}

async fn serve_video(
    ctx: &AppContext,
    title: Option<&str>,
    headers: &HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    let paths = ctx.catalog.resolve(title).map_err(catalog_error)?;

    if !paths.video.is_file() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No video for title: {}", paths.title),
        ));
    }

    stream_file(&paths.video, range_header(headers), "video/mp4").await
}

async fn subtitle(
    State(ctx): State<AppContext>,
    Path(title): Path<String>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    serve_subtitle(&ctx, Some(&title), &headers).await
}

async fn latest_subtitle(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    serve_subtitle(&ctx, None, &headers).await
}

async fn serve_subtitle(
    ctx: &AppContext,
    title: Option<&str>,
    headers: &HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    let paths = ctx.catalog.resolve(title).map_err(catalog_error)?;

    if !paths.subtitle.is_file() {
        return Err((StatusCode::NOT_FOUND, "No subtitles".to_string()));
    }

    stream_file(&paths.subtitle, range_header(headers), "text/vtt").await
}

async fn hls_file(
    State(ctx): State<AppContext>,
    Path((title, file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    if !valid_segment_name(&file) {
        return Err((StatusCode::NOT_FOUND, format!("No such segment: {}", file)));
    }

    let paths = ctx.catalog.resolve(Some(&title)).map_err(catalog_error)?;
    let target = paths.hls_dir.join(&file);

    if !target.is_file() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No HLS artifact for title: {}", paths.title),
        ));
    }

    stream_file(&target, range_header(&headers), content_type_for(&target)).await
}

/// HLS requests may only name the playlist or a segment directly inside the
/// title's hls directory.
fn valid_segment_name(file: &str) -> bool {
    if file == HLS_PLAYLIST {
        return true;
    }
    !file.contains('/')
        && !file.contains('\\')
        && !file.contains("..")
        && (file.ends_with(".ts") || file.ends_with(".m3u8"))
}

/// Whether an intake path would be picked up by the pipeline; used by the
/// upload routes to warn early.
pub(crate) fn recognized_upload(ctx: &AppContext, name: &str) -> bool {
    is_supported(std::path::Path::new(name), &ctx.config.intake.extensions)
}
