//! Handing one decrypted secret to a child process.
//!
//! The secret is staged in a private token file inside a per-invocation
//! temporary directory. A generated launcher script reads the token into
//! an environment variable, deletes the token file, then execs the target
//! program. The script only ever embeds the token's path.
//!
//! ```text
//! create_temp_auth_dir -> write_token_file -> generate_launcher_script
//!      -> spawn script.command() -> wait -> TempAuthDir::close
//! ```

mod escape;
mod script;

pub use escape::{escape_shell_arg, quote_posix, quote_powershell};
pub use script::{
    ExecutionMode, LauncherScript, ScriptPlatform, generate_launcher_script,
    generate_launcher_script_for,
};

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{KeyswitchError, Result};
use crate::utils::{OpenMode, open_private, restrict_dir_permissions};

/// Environment variable populated when the caller names none.
pub const DEFAULT_ENV_VAR: &str = "API_KEY";

const TEMP_DIR_PREFIX: &str = "keyswitch-auth-";

/// Owner-only temporary directory, removed on [`close`](TempAuthDir::close)
/// or drop.
#[derive(Debug)]
pub struct TempAuthDir {
    inner: tempfile::TempDir,
}

impl TempAuthDir {
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Remove the directory and everything left in it.
    pub fn close(self) -> Result<()> {
        let path = self.inner.path().to_path_buf();
        self.inner
            .close()
            .map_err(|e| KeyswitchError::storage("failed to remove temporary directory", &path, e))
    }
}

/// Create a uniquely named private directory under the system temp dir.
pub fn create_temp_auth_dir() -> Result<TempAuthDir> {
    create_temp_auth_dir_in(&std::env::temp_dir())
}

/// Create a uniquely named private directory under `parent`.
pub fn create_temp_auth_dir_in(parent: &Path) -> Result<TempAuthDir> {
    let inner = tempfile::Builder::new()
        .prefix(TEMP_DIR_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| KeyswitchError::storage("failed to create temporary directory in", parent, e))?;
    restrict_dir_permissions(inner.path())?;
    tracing::debug!(path = %inner.path().display(), "created temporary auth directory");
    Ok(TempAuthDir { inner })
}

/// Write `secret` as raw bytes to a new owner-only file under `dir`.
///
/// The launcher reads the file into an environment variable, which cannot
/// carry NUL and, on Unix, loses trailing newlines. Secrets containing
/// `\n`, `\r` or NUL are rejected rather than silently altered.
pub fn write_token_file(dir: &Path, secret: &[u8]) -> Result<PathBuf> {
    if secret.is_empty() {
        return Err(KeyswitchError::validation("secret cannot be empty"));
    }
    if secret.iter().any(|&b| matches!(b, b'\n' | b'\r' | 0)) {
        return Err(KeyswitchError::validation(
            "secret cannot contain newlines or NUL bytes",
        ));
    }

    let path = dir.join(format!("token-{}", uuid::Uuid::new_v4()));
    let mut file = open_private(&path, OpenMode::CreateNew, false)
        .map_err(|e| KeyswitchError::storage("failed to create token file", &path, e))?;
    if let Err(e) = file.write_all(secret).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = std::fs::remove_file(&path);
        return Err(KeyswitchError::storage("failed to write token file", &path, e));
    }

    tracing::debug!(path = %path.display(), "wrote token file");
    Ok(path)
}
