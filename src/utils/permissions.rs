//! File permission utilities for restricting access to sensitive files.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use crate::error::{KeyswitchError, Result};

/// Set owner-only permissions (0o700) on a directory.
///
/// On other platforms this is a no-op since the permission model differs.
pub fn restrict_dir_permissions(path: &Path) -> Result<()> {
    set_mode(path, 0o700)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| KeyswitchError::storage("failed to set permissions on", path, e))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, _mode: u32) -> Result<()> {
    let _ = path;
    Ok(())
}

/// How [`open_private`] treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the file or truncate an existing one.
    Truncate,
    /// Fail with `AlreadyExists` if the file is present.
    CreateNew,
}

/// Open `path` for writing with owner-only permissions.
///
/// The mode is applied at creation time and re-applied afterwards, since a
/// truncated pre-existing file keeps whatever mode it had. Returns the raw
/// `io::Error` so callers can react to `AlreadyExists`.
pub fn open_private(path: &Path, mode: OpenMode, executable: bool) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    match mode {
        OpenMode::Truncate => options.create(true).truncate(true),
        OpenMode::CreateNew => options.create_new(true),
    };

    let file_mode = if executable { 0o700 } else { 0o600 };

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(file_mode);
    }

    let file = options.open(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(file_mode))?;
    }
    #[cfg(not(unix))]
    let _ = file_mode;

    Ok(file)
}
