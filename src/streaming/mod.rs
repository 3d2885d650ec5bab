//! File streaming with HTTP range requests.
//!
//! Serves published artifacts (progressive MP4, caption track, HLS playlist
//! and segments) with byte-range support. Reads proceed in bounded-size
//! chunks so memory use is independent of file size.

use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Read increment for streamed responses.
const CHUNK_SIZE: usize = 1024 * 1024;

/// A byte-range header that could not be honored.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RangeError {
    /// Bad syntax: missing prefix or dash, non-numeric fields.
    #[error("malformed byte range: {0}")]
    Malformed(String),

    /// Syntactically valid but outside the file.
    #[error("unsatisfiable byte range: {0}")]
    Unsatisfiable(String),
}

/// Parse an HTTP Range header against a file size.
///
/// Supports `bytes=0-499`, `bytes=500-` and the suffix form `bytes=-500`.
/// The end offset is clamped to the last byte of the file.
pub fn parse_range(header: &str, file_size: u64) -> Result<(u64, u64), RangeError> {
    let spec = header
        .strip_prefix("bytes=")
        .ok_or_else(|| RangeError::Malformed(header.to_string()))?;

    let parts: Vec<&str> = spec.split('-').collect();
    if parts.len() != 2 {
        return Err(RangeError::Malformed(header.to_string()));
    }

    let start = parts[0].trim();
    let end = parts[1].trim();

    if file_size == 0 {
        return Err(RangeError::Unsatisfiable(header.to_string()));
    }

    match (start.is_empty(), end.is_empty()) {
        // bytes=-500 (last 500 bytes)
        (true, false) => {
            let suffix_len: u64 = end
                .parse()
                .map_err(|_| RangeError::Malformed(header.to_string()))?;
            if suffix_len == 0 {
                return Err(RangeError::Unsatisfiable(header.to_string()));
            }
            let start = file_size.saturating_sub(suffix_len);
            Ok((start, file_size - 1))
        }
        // bytes=500- (from 500 to end)
        (false, true) => {
            let start: u64 = start
                .parse()
                .map_err(|_| RangeError::Malformed(header.to_string()))?;
            if start >= file_size {
                return Err(RangeError::Unsatisfiable(header.to_string()));
            }
            Ok((start, file_size - 1))
        }
        // bytes=0-499
        (false, false) => {
            let start: u64 = start
                .parse()
                .map_err(|_| RangeError::Malformed(header.to_string()))?;
            let end: u64 = end
                .parse()
                .map_err(|_| RangeError::Malformed(header.to_string()))?;
            if start >= file_size || start > end {
                return Err(RangeError::Unsatisfiable(header.to_string()));
            }
            Ok((start, end.min(file_size - 1)))
        }
        // bytes=-
        (true, true) => Err(RangeError::Malformed(header.to_string())),
    }
}

/// Determine the content type for a published artifact.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("vtt") => "text/vtt",
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        _ => "application/octet-stream",
    }
}

/// Serve a file, honoring an optional Range header.
///
/// No header yields a 200 with the full content; a valid range yields a 206
/// with exactly `end - start + 1` bytes; a malformed range is a 400 and an
/// unsatisfiable one a 416. All responses advertise range support.
pub async fn stream_file(
    path: &Path,
    range_header: Option<&str>,
    content_type: &'static str,
) -> Result<Response, (StatusCode, String)> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| (StatusCode::NOT_FOUND, "File not found".to_string()))?;
    let file_size = metadata.len();

    let range = match range_header {
        Some(header) => match parse_range(header, file_size) {
            Ok(range) => Some(range),
            Err(e @ RangeError::Malformed(_)) => {
                return Err((StatusCode::BAD_REQUEST, e.to_string()));
            }
            Err(e @ RangeError::Unsatisfiable(_)) => {
                return Err((StatusCode::RANGE_NOT_SATISFIABLE, e.to_string()));
            }
        },
        None => None,
    };

    match range {
        Some((start, end)) => {
            let length = end - start + 1;

            let mut file = File::open(path)
                .await
                .map_err(|_| (StatusCode::NOT_FOUND, "File not found".to_string()))?;

            file.seek(SeekFrom::Start(start)).await.map_err(|e| {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Seek failed: {}", e))
            })?;

            let stream = ReaderStream::with_capacity(file.take(length), CHUNK_SIZE);
            let body = Body::from_stream(stream);

            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, length.to_string())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, file_size),
                )
                .header(header::ACCEPT_RANGES, "bytes")
                .body(body)
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
        None => {
            let file = File::open(path)
                .await
                .map_err(|_| (StatusCode::NOT_FOUND, "File not found".to_string()))?;

            let stream = ReaderStream::with_capacity(file, CHUNK_SIZE);
            let body = Body::from_stream(stream);

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, file_size.to_string())
                .header(header::ACCEPT_RANGES, "bytes")
                .body(body)
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Extract the Range header from a request's headers, if present.
pub fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::RANGE).and_then(|h| h.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_full_range() {
        assert_eq!(parse_range("bytes=0-499", 1000), Ok((0, 499)));
    }

    #[test]
    fn test_parse_range_open_end() {
        assert_eq!(parse_range("bytes=500-", 1000), Ok((500, 999)));
    }

    #[test]
    fn test_parse_range_suffix() {
        assert_eq!(parse_range("bytes=-200", 1000), Ok((800, 999)));
    }

    #[test]
    fn test_parse_range_end_clamped_to_eof() {
        assert_eq!(parse_range("bytes=0-9999", 1000), Ok((0, 999)));
    }

    #[test]
    fn test_parse_range_start_beyond_eof_unsatisfiable() {
        assert!(matches!(
            parse_range("bytes=1500-", 1000),
            Err(RangeError::Unsatisfiable(_))
        ));
        assert!(matches!(
            parse_range("bytes=1000-1200", 1000),
            Err(RangeError::Unsatisfiable(_))
        ));
    }

    #[test]
    fn test_parse_range_inverted_unsatisfiable() {
        assert!(matches!(
            parse_range("bytes=500-100", 1000),
            Err(RangeError::Unsatisfiable(_))
        ));
    }

    #[test]
    fn test_parse_range_malformed() {
        for bad in ["bytes=-", "bytes=abc-def", "0-499", "bytes=1-2-3"] {
            assert!(
                matches!(parse_range(bad, 1000), Err(RangeError::Malformed(_))),
                "expected malformed: {}",
                bad
            );
        }
    }

    #[test]
    fn test_parse_range_empty_file_unsatisfiable() {
        assert!(matches!(
            parse_range("bytes=0-10", 0),
            Err(RangeError::Unsatisfiable(_))
        ));
    }

    #[test]
    fn test_content_type_for_artifacts() {
        assert_eq!(content_type_for(Path::new("a/movie.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a/movie.vtt")), "text/vtt");
        assert_eq!(
            content_type_for(Path::new("a/hls/index.m3u8")),
            "application/vnd.apple.mpegurl"
        );
        assert_eq!(content_type_for(Path::new("a/hls/segment_001.ts")), "video/mp2t");
        assert_eq!(
            content_type_for(Path::new("a/unknown.bin")),
            "application/octet-stream"
        );
    }
}
