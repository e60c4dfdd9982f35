//! Filesystem object store for uploaded media.
//!
//! Files live under `root/<folder>/<uuid>.<ext>` and are addressed publicly as
//! `base_url/<folder>/<uuid>.<ext>`.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use image::ImageReader;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::editor::PendingUpload;
use crate::error::{Error, Result};

pub const COVERS_FOLDER: &str = "covers";
pub const WORK_IMAGES_FOLDER: &str = "works";
pub const ADS_FOLDER: &str = "advertisements";

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    base_url: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stores an upload under `folder` with a random name and returns its URL.
    ///
    /// The bytes must be a recognizable image; the extension follows the
    /// detected format, not the submitted file name.
    pub fn upload(&self, upload: &PendingUpload, folder: &str) -> Result<String> {
        if !is_plain_relative(Path::new(folder)) {
            return Err(Error::InvalidUpload(format!("bad folder name: {folder}")));
        }

        let format = image::guess_format(&upload.bytes).map_err(|_| {
            Error::InvalidUpload(format!("{} is not a supported image", upload.file_name))
        })?;
        let ext = format.extensions_str().first().copied().unwrap_or("bin");

        let name = format!("{}.{}", Uuid::new_v4(), ext);
        let dir = self.root.join(folder);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(&name);
        std::fs::write(&path, &upload.bytes)?;

        debug!(file = %upload.file_name, path = ?path, "Stored upload");
        Ok(format!("{}/{}/{}", self.base_url, folder, name))
    }

    /// Maps a public URL back to its file. `None` for URLs this store does not own.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        let relative = Path::new(relative);
        if relative.as_os_str().is_empty() || !is_plain_relative(relative) {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Removes the file behind `url`. Returns whether a file was removed.
    pub fn delete(&self, url: &str) -> Result<bool> {
        let path = self
            .path_for_url(url)
            .ok_or_else(|| Error::InvalidUpload(format!("not a stored media URL: {url}")))?;

        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = ?path, "Removed media file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(url, "Media file already gone");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Reads width and height without decoding the full image.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    let bytes = std::fs::read(path)?;
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader
        .into_dimensions()
        .map_err(|e| Error::InvalidUpload(format!("{}: {e}", path.display())))
}
