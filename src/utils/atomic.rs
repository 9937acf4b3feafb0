//! Create-temp-then-rename file replacement.
//!
//! A [`PendingFile`] is an owner-only temporary file in the same directory
//! as its target. Writing goes to the temporary file; [`PendingFile::commit`]
//! fsyncs it and renames it over the target in one step, so a reader (or a
//! crash) sees either the old contents or the new ones, never a mix. If the
//! pending file is dropped without being committed, including while
//! unwinding from a panic, the temporary file is removed.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::permissions::{OpenMode, open_private};
use crate::error::{KeyswitchError, Result};

/// A temporary file that replaces `target` on commit.
#[derive(Debug)]
pub struct PendingFile {
    temp_path: PathBuf,
    target: PathBuf,
    file: Option<File>,
}

impl PendingFile {
    /// Create an empty owner-only temporary file next to `target`.
    pub fn create(target: &Path) -> Result<Self> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let temp_path = dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()));

        let file = open_private(&temp_path, OpenMode::CreateNew, false)
            .map_err(|e| KeyswitchError::storage("failed to create temporary file", &temp_path, e))?;

        Ok(Self {
            temp_path,
            target: target.to_path_buf(),
            file: Some(file),
        })
    }

    /// Path of the temporary file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Path the file will be renamed to on commit.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Write the whole buffer to the temporary file.
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let temp_path = self.temp_path.clone();
        self.file_mut()?
            .write_all(data)
            .map_err(|e| KeyswitchError::storage("failed to write", &temp_path, e))
    }

    /// Borrow the underlying file for streaming writers.
    pub fn file_mut(&mut self) -> Result<&mut File> {
        let temp_path = &self.temp_path;
        self.file.as_mut().ok_or_else(|| {
            KeyswitchError::storage(
                "temporary file already closed",
                temp_path,
                std::io::Error::other("closed"),
            )
        })
    }

    /// Flush, fsync and atomically rename the temporary file over the target.
    pub fn commit(mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .and_then(|_| file.sync_all())
                .map_err(|e| KeyswitchError::storage("failed to flush", &self.temp_path, e))?;
        }

        fs::rename(&self.temp_path, &self.target)
            .map_err(|e| KeyswitchError::storage("failed to replace", &self.target, e))?;

        // Disarm the drop cleanup: the temporary path no longer exists.
        self.temp_path = PathBuf::new();
        Ok(())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        self.file.take();
        if !self.temp_path.as_os_str().is_empty() {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                tracing::warn!(path = %self.temp_path.display(), error = %e, "failed to remove temporary file");
            }
        }
    }
}

/// Atomically replace `target` with `data`.
pub fn write_atomic(target: &Path, data: &[u8]) -> Result<()> {
    let mut pending = PendingFile::create(target)?;
    pending.write_all(data)?;
    pending.commit()
}
