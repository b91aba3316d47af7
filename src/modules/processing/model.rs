use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use super::error::PipelineError;
use crate::common::mime::mime_type;

pub const INPUT_FILE_NAME: &str = "input";
pub const HLS_DIR_NAME: &str = "hls";
pub const WORK_DIR_PREFIX: &str = "video_processing_";

pub const THUMBNAIL_FILE_NAME: &str = "thumbnail.jpg";
pub const THUMBNAIL_TIME_OFFSET: &str = "00:00:00";
pub const THUMBNAIL_WIDTH: u32 = 320;
pub const THUMBNAIL_HEIGHT: u32 = 240;

/// The video id is the object's file name without its extension, e.g.
/// `raw/550e8400-e29b-41d4-a716-446655440000.mp4`.
pub fn video_id_from_key(key: &str) -> Result<Uuid, PipelineError> {
    let invalid = |reason: String| PipelineError::InvalidVideoId {
        key: key.to_string(),
        reason,
    };

    let stem = Path::new(key)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| invalid("object key has no file name".to_string()))?;

    let id = Uuid::parse_str(stem).map_err(|e| invalid(e.to_string()))?;
    if id.is_nil() {
        return Err(invalid("nil uuid".to_string()));
    }
    Ok(id)
}

/// A local file headed for the processed bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub key: String,
    pub content_type: &'static str,
}

impl Artifact {
    /// Keyed `{video_id}/hls/{path relative to hls_root}`.
    pub fn hls(video_id: Uuid, hls_root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(hls_root).ok()?;
        Some(Self {
            path: path.to_path_buf(),
            key: format!("{}/{}/{}", video_id, HLS_DIR_NAME, key_path(relative)?),
            content_type: mime_type(path),
        })
    }

    pub fn thumbnail(video_id: Uuid, path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            key: format!("{}/{}", video_id, THUMBNAIL_FILE_NAME),
            content_type: mime_type(path),
        }
    }
}

/// Joins normal path components with `/`, whatever the host separator.
fn key_path(relative: &Path) -> Option<String> {
    let parts = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Private per-job directory, `{root}/video_processing_{video_id}`.
///
/// Removed by [`WorkDir::cleanup`], or on drop if the job unwinds first.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    removed: bool,
}

impl WorkDir {
    pub async fn create(root: &Path, video_id: Uuid) -> io::Result<Self> {
        let path = root.join(format!("{}{}", WORK_DIR_PREFIX, video_id));

        // Leftovers from a crashed run of the same video.
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => warn!("Removed stale working directory {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        tokio::fs::create_dir_all(&path).await?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn input_path(&self) -> PathBuf {
        self.path.join(INPUT_FILE_NAME)
    }

    pub fn hls_dir(&self) -> PathBuf {
        self.path.join(HLS_DIR_NAME)
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.path.join(THUMBNAIL_FILE_NAME)
    }

    pub async fn cleanup(mut self) -> io::Result<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove working directory {}: {}", self.path.display(), e);
            }
        }
    }
}
