//! Read-only view over the published-media directory tree.
//!
//! One subdirectory per title, holding `{title}.mp4`, optionally
//! `{title}.vtt`, and optionally an `hls/` subdirectory. A title with its
//! progressive container present is "ready"; a title directory without it is
//! still processing. All state is filesystem-resident.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

pub const VIDEO_EXT: &str = "mp4";
pub const SUBTITLE_EXT: &str = "vtt";
pub const HLS_DIR: &str = "hls";
pub const HLS_PLAYLIST: &str = "index.m3u8";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("title not found: {0}")]
    NotFound(String),

    #[error("no titles published")]
    Empty,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Artifact paths for one title.
#[derive(Debug, Clone)]
pub struct TitlePaths {
    pub title: String,
    pub dir: PathBuf,
    pub video: PathBuf,
    pub subtitle: PathBuf,
    pub hls_dir: PathBuf,
}

/// Readiness of a title's artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct TitleStatus {
    /// The progressive container exists.
    pub ready: bool,
    /// A caption track exists.
    pub subtitle: bool,
}

pub struct MediaCatalog {
    root: PathBuf,
}

impl MediaCatalog {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// List published titles, most recently modified first, ties broken by
    /// name so the order is total.
    pub fn list_titles(&self) -> Result<Vec<String>, CatalogError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<(SystemTime, String)> = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let modified = entry.metadata()?.modified()?;
            entries.push((modified, name));
        }

        entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        Ok(entries.into_iter().map(|(_, name)| name).collect())
    }

    /// Resolve a title (or `None` for the most recent) to artifact paths.
    pub fn resolve(&self, title: Option<&str>) -> Result<TitlePaths, CatalogError> {
        let title = match title {
            Some(title) => {
                if !valid_title(title) {
                    return Err(CatalogError::NotFound(title.to_string()));
                }
                title.to_string()
            }
            None => self
                .list_titles()?
                .into_iter()
                .next()
                .ok_or(CatalogError::Empty)?,
        };

        let dir = self.root.join(&title);
        if !dir.is_dir() {
            return Err(CatalogError::NotFound(title));
        }

        Ok(TitlePaths {
            video: dir.join(format!("{}.{}", title, VIDEO_EXT)),
            subtitle: dir.join(format!("{}.{}", title, SUBTITLE_EXT)),
            hls_dir: dir.join(HLS_DIR),
            title,
            dir,
        })
    }

    /// Report whether a title is ready and whether it has a caption track.
    pub fn status(&self, title: &str) -> Result<TitleStatus, CatalogError> {
        let paths = self.resolve(Some(title))?;
        Ok(TitleStatus {
            ready: paths.video.is_file(),
            subtitle: paths.subtitle.is_file(),
        })
    }

    /// Remove a title's entire subtree.
    pub fn delete(&self, title: &str) -> Result<(), CatalogError> {
        let paths = self.resolve(Some(title))?;
        std::fs::remove_dir_all(&paths.dir)?;
        Ok(())
    }
}

/// Titles are single path components; anything that could escape the
/// catalog root is treated as absent.
fn valid_title(title: &str) -> bool {
    !title.is_empty()
        && title != "."
        && title != ".."
        && !title.contains('/')
        && !title.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn publish(catalog: &MediaCatalog, title: &str, with_video: bool, with_subs: bool) {
        let dir = catalog.root().join(title);
        std::fs::create_dir_all(&dir).unwrap();
        if with_video {
            std::fs::write(dir.join(format!("{}.mp4", title)), b"video").unwrap();
        }
        if with_subs {
            std::fs::write(dir.join(format!("{}.vtt", title)), b"WEBVTT").unwrap();
        }
    }

    #[test]
    fn test_list_titles_most_recent_first() {
        let root = tempfile::tempdir().unwrap();
        let catalog = MediaCatalog::new(root.path().to_path_buf());

        publish(&catalog, "older", true, false);
        std::thread::sleep(Duration::from_millis(20));
        publish(&catalog, "newer", true, false);

        assert_eq!(catalog.list_titles().unwrap(), vec!["newer", "older"]);
    }

    #[test]
    fn test_list_titles_missing_root_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let catalog = MediaCatalog::new(root.path().join("not-created-yet"));
        assert!(catalog.list_titles().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_latest() {
        let root = tempfile::tempdir().unwrap();
        let catalog = MediaCatalog::new(root.path().to_path_buf());

        publish(&catalog, "first", true, false);
        std::thread::sleep(Duration::from_millis(20));
        publish(&catalog, "second", true, false);

        let paths = catalog.resolve(None).unwrap();
        assert_eq!(paths.title, "second");
        assert!(paths.video.ends_with("second/second.mp4"));
    }

    #[test]
    fn test_resolve_empty_catalog() {
        let root = tempfile::tempdir().unwrap();
        let catalog = MediaCatalog::new(root.path().to_path_buf());
        assert!(matches!(catalog.resolve(None), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_status_reports_artifacts_independently() {
        let root = tempfile::tempdir().unwrap();
        let catalog = MediaCatalog::new(root.path().to_path_buf());

        publish(&catalog, "full", true, true);
        publish(&catalog, "video-only", true, false);
        publish(&catalog, "processing", false, false);

        let full = catalog.status("full").unwrap();
        assert!(full.ready && full.subtitle);

        let video_only = catalog.status("video-only").unwrap();
        assert!(video_only.ready && !video_only.subtitle);

        let processing = catalog.status("processing").unwrap();
        assert!(!processing.ready && !processing.subtitle);
    }

    #[test]
    fn test_delete_removes_subtree() {
        let root = tempfile::tempdir().unwrap();
        let catalog = MediaCatalog::new(root.path().to_path_buf());

        publish(&catalog, "doomed", true, true);
        std::fs::create_dir_all(catalog.root().join("doomed").join("hls")).unwrap();

        catalog.delete("doomed").unwrap();
        assert!(matches!(
            catalog.resolve(Some("doomed")),
            Err(CatalogError::NotFound(_))
        ));
        assert!(catalog.list_titles().unwrap().is_empty());

        // Deleting again reports NotFound.
        assert!(matches!(
            catalog.delete("doomed"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_traversal_titles_are_not_found() {
        let root = tempfile::tempdir().unwrap();
        let catalog = MediaCatalog::new(root.path().to_path_buf());

        for bad in ["../escape", "a/b", "..", ""] {
            assert!(matches!(
                catalog.resolve(Some(bad)),
                Err(CatalogError::NotFound(_))
            ));
        }
    }
}
