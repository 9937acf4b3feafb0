//! Key pair generation, persistence and parsing.
//!
//! A key file holds exactly two newline-terminated lines with owner-only
//! permissions:
//!
//! ```text
//! AGE-SECRET-KEY-1...   <- identity (private)
//! age1...               <- recipient (public)
//! ```
//!
//! A file with fewer than two non-empty lines is rejected as a whole; it is
//! never partially accepted.

use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use age::secrecy::ExposeSecret;
use zeroize::Zeroizing;

use crate::error::{KeyFileProblem, KeyswitchError, Result};
use crate::utils::{OpenMode, open_private, restrict_dir_permissions};

/// File name of the key pair inside a configuration directory.
pub const KEY_FILE_NAME: &str = "keyswitch.key";

/// Path of the key file inside `dir`.
pub fn key_path(dir: &Path) -> PathBuf {
    dir.join(KEY_FILE_NAME)
}

/// An age X25519 identity and its recipient.
pub struct KeyPair {
    identity: age::x25519::Identity,
    recipient: age::x25519::Recipient,
}

impl KeyPair {
    /// Generate a fresh key pair.
    pub fn generate() -> Self {
        let identity = age::x25519::Identity::generate();
        let recipient = identity.to_public();
        Self {
            identity,
            recipient,
        }
    }

    pub fn identity(&self) -> &age::x25519::Identity {
        &self.identity
    }

    pub fn recipient(&self) -> &age::x25519::Recipient {
        &self.recipient
    }

    /// The public recipient in its `age1...` text form.
    pub fn recipient_string(&self) -> String {
        self.recipient.to_string()
    }

    /// The two-line key file body.
    pub fn to_file_contents(&self) -> Zeroizing<String> {
        let identity = self.identity.to_string();
        Zeroizing::new(format!(
            "{}\n{}\n",
            identity.expose_secret(),
            self.recipient
        ))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("identity", &"[REDACTED]")
            .field("recipient", &self.recipient.to_string())
            .finish()
    }
}

/// Generate a fresh key pair and write it to `path`, truncating any file
/// already there.
///
/// This destroys whatever key was stored at `path`; replacing a live key
/// goes through [`crate::rotation::KeyRotator`] instead.
pub fn generate(path: &Path) -> Result<KeyPair> {
    let pair = KeyPair::generate();
    let mut file = open_private(path, OpenMode::Truncate, false)
        .map_err(|e| KeyswitchError::storage("failed to create key file", path, e))?;
    write_key_file(&mut file, &pair, path)?;
    tracing::debug!(path = %path.display(), recipient = %pair.recipient, "generated key pair");
    Ok(pair)
}

fn write_key_file(file: &mut fs::File, pair: &KeyPair, path: &Path) -> Result<()> {
    let contents = pair.to_file_contents();
    file.write_all(contents.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| KeyswitchError::storage("failed to write key file", path, e))
}

/// Make sure a key file exists in `dir`, generating one if needed.
///
/// The directory is created with owner-only permissions when missing.
/// Creation uses an exclusive create, so two invocations racing on the
/// same directory cannot both write a key; the loser sees the winner's
/// file and does nothing. Returns `true` if a new key was generated.
pub fn ensure_exists(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .map_err(|e| KeyswitchError::storage("failed to create directory", dir, e))?;
        restrict_dir_permissions(dir)?;
    }

    let path = key_path(dir);
    let mut file = match open_private(&path, OpenMode::CreateNew, false) {
        Ok(f) => f,
        Err(e) if e.kind() == IoErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(KeyswitchError::storage("failed to create key file", &path, e)),
    };

    let pair = KeyPair::generate();
    if let Err(e) = write_key_file(&mut file, &pair, &path) {
        // Do not leave a half-written key behind for the next call to accept.
        drop(file);
        let _ = fs::remove_file(&path);
        return Err(e);
    }
    tracing::info!(path = %path.display(), "created new key file");
    Ok(true)
}

/// Read the key file and return its first two non-empty lines.
fn read_key_lines(path: &Path) -> Result<(Zeroizing<String>, String)> {
    let contents = Zeroizing::new(
        fs::read_to_string(path).map_err(|e| KeyswitchError::read_failed("key file", path, e))?,
    );

    let mut lines = contents.lines().map(str::trim).filter(|l| !l.is_empty());
    let identity = match lines.next() {
        Some(line) => Zeroizing::new(line.to_string()),
        None => return Err(KeyswitchError::key_file(KeyFileProblem::Empty, path)),
    };
    let recipient = match lines.next() {
        Some(line) => line.to_string(),
        None => {
            return Err(KeyswitchError::key_file(KeyFileProblem::MissingRecipient, path));
        }
    };

    Ok((identity, recipient))
}

fn parse_identity(line: &str, path: &Path) -> Result<age::x25519::Identity> {
    line.parse::<age::x25519::Identity>()
        .map_err(|_| KeyswitchError::key_file(KeyFileProblem::InvalidIdentity, path))
}

fn parse_recipient(line: &str, path: &Path) -> Result<age::x25519::Recipient> {
    line.parse::<age::x25519::Recipient>()
        .map_err(|_| KeyswitchError::key_file(KeyFileProblem::InvalidRecipient, path))
}

/// Load the private identity (line 1) from a key file.
pub fn load_identity(path: &Path) -> Result<age::x25519::Identity> {
    let (identity, _) = read_key_lines(path)?;
    parse_identity(&identity, path)
}

/// Load the public recipient (line 2) from a key file.
pub fn load_recipient(path: &Path) -> Result<age::x25519::Recipient> {
    let (_, recipient) = read_key_lines(path)?;
    parse_recipient(&recipient, path)
}

/// Load both halves and check that they belong together.
pub fn load_key_pair(path: &Path) -> Result<KeyPair> {
    let (identity_line, recipient_line) = read_key_lines(path)?;
    let identity = parse_identity(&identity_line, path)?;
    let recipient = parse_recipient(&recipient_line, path)?;

    if identity.to_public().to_string() != recipient.to_string() {
        return Err(KeyswitchError::key_file(KeyFileProblem::Mismatched, path));
    }

    Ok(KeyPair {
        identity,
        recipient,
    })
}
