//! Upload intake routes.
//!
//! Both routes only save raw bytes into the intake directory and return the
//! saved name; the directory watcher takes it from there.

use crate::server::routes_media::recognized_upload;
use crate::server::AppContext;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub fn upload_routes() -> Router<AppContext> {
    Router::new()
        .route("/upload", post(upload_file))
        .route("/upload/url", post(upload_url))
}

#[derive(Serialize)]
struct UploadResponse {
    name: String,
}

async fn upload_file(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, String)> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original = field
            .file_name()
            .map(sanitize_file_name)
            .unwrap_or_else(|| "upload.bin".to_string());

        let dest = unique_intake_path(&ctx.config.intake.dir, &original);
        let mut out = tokio::fs::File::create(&dest).await.map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create intake file: {}", e),
            )
        })?;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
        {
            out.write_all(&chunk).await.map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to write intake file: {}", e),
                )
            })?;
        }
        out.flush().await.map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to flush intake file: {}", e),
            )
        })?;

        let name = saved_name(&dest);
        if !recognized_upload(&ctx, &name) {
            tracing::warn!("Saved upload '{}' has an unrecognized extension", name);
        }
        tracing::info!("Upload saved to intake: {}", name);
        return Ok(Json(UploadResponse { name }));
    }

    Err((
        StatusCode::BAD_REQUEST,
        "Missing multipart field 'file'".to_string(),
    ))
}

#[derive(Deserialize)]
struct UploadUrlRequest {
    url: String,
}

async fn upload_url(
    State(ctx): State<AppContext>,
    Json(req): Json<UploadUrlRequest>,
) -> Result<Json<UploadResponse>, (StatusCode, String)> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(ctx.config.upload.download_timeout_secs))
        .build()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let response = client
        .get(&req.url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("Download failed: {}", e)))?;

    let original = response
        .url()
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|s| !s.is_empty())
        .map(sanitize_file_name)
        .unwrap_or_else(|| "download.bin".to_string());

    let dest = unique_intake_path(&ctx.config.intake.dir, &original);
    let mut out = tokio::fs::File::create(&dest).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to create intake file: {}", e),
        )
    })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| (StatusCode::BAD_GATEWAY, format!("Download failed: {}", e)))?;
        out.write_all(&chunk).await.map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to write intake file: {}", e),
            )
        })?;
    }
    out.flush().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to flush intake file: {}", e),
        )
    })?;

    let name = saved_name(&dest);
    tracing::info!("Remote download saved to intake: {}", name);
    Ok(Json(UploadResponse { name }))
}

/// Keep only the final path component of a client-supplied name.
fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty() && n != "." && n != "..")
        .unwrap_or_else(|| "upload.bin".to_string())
}

/// Pick a non-colliding path inside the intake directory, appending a short
/// random suffix to the stem while a file of that name exists.
fn unique_intake_path(intake_dir: &Path, name: &str) -> PathBuf {
    let mut dest = intake_dir.join(name);
    while dest.exists() {
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let ext = Path::new(name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let suffix: String = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        dest = intake_dir.join(format!("{}-{}{}", stem, suffix, ext));
    }
    dest
}

fn saved_name(dest: &Path) -> String {
    dest.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
