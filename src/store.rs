use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::AppError;

/// Append-only directory of generated WAV files.
///
/// Names carry a v4 UUID, so concurrent requests never collide. Nothing is
/// ever evicted; files accumulate until removed externally.
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    /// Create the directory if needed and pin its absolute path.
    pub fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let dir = std::fs::canonicalize(dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn new_filename() -> String {
        format!("tts_{}.wav", Uuid::new_v4().simple())
    }

    pub fn new_request_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    pub fn segment_path(&self, request_id: &str, index: usize) -> PathBuf {
        self.dir.join(format!("seg_{}_{}.wav", request_id, index))
    }

    /// Map a client-supplied filename to a stored file.
    ///
    /// Separators and parent references are rejected before any filesystem access.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, AppError> {
        if !is_safe_filename(filename) {
            return Err(AppError::InvalidFilename);
        }

        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(AppError::AudioNotFound(filename.to_string()));
        }

        Ok(path)
    }
}

/// Delete a scratch file. A file that is already gone counts as removed.
pub fn remove_temp(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

pub fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
}
