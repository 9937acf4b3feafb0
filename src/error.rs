//! Unified error type for keyswitch.
//!
//! All public APIs return `Result<T, KeyswitchError>`. Every variant belongs
//! to one [`ErrorKind`] so the calling layer can pick a remediation hint
//! (restore a backup, check permissions, re-run `init`) without this crate
//! knowing about those commands. Each variant also carries an
//! [`ErrorContext`] with structured `key -> value` details such as the path
//! involved. Secret material never ends up in an error.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Coarse classification of a [`KeyswitchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Filesystem I/O failed (permissions, missing parent directory, disk full).
    Storage,
    /// Bytes on disk do not parse as the expected structure.
    Format,
    /// A cryptographic operation rejected its input.
    Crypto,
    /// The caller supplied an empty or invalid argument.
    Validation,
    /// A required file does not exist.
    NotFound,
    /// Automatic rollback failed; a human has to restore the named backup.
    ManualRecovery,
    /// The configuration file could not be read or parsed.
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Storage => "storage",
            ErrorKind::Format => "format",
            ErrorKind::Crypto => "crypto",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not-found",
            ErrorKind::ManualRecovery => "manual-recovery",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

/// What exactly is wrong with a key file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFileProblem {
    /// The file has no non-empty lines at all.
    Empty,
    /// Line 1 is present but the recipient line is missing.
    MissingRecipient,
    /// Line 1 does not parse as an identity.
    InvalidIdentity,
    /// Line 2 does not parse as a recipient.
    InvalidRecipient,
    /// Both lines parse but the recipient does not belong to the identity.
    Mismatched,
}

impl fmt::Display for KeyFileProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KeyFileProblem::Empty => "key file is empty",
            KeyFileProblem::MissingRecipient => "key file is missing recipient line",
            KeyFileProblem::InvalidIdentity => "key file is corrupted (identity line)",
            KeyFileProblem::InvalidRecipient => "key file is corrupted (recipient line)",
            KeyFileProblem::Mismatched => "key file recipient does not match its identity",
        };
        f.write_str(msg)
    }
}

/// Ordered `key -> value` details attached to an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext(BTreeMap<String, String>);

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry, returning `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn for_path(path: &Path) -> Self {
        Self::new().with("path", path.display().to_string())
    }
}

/// The unified error type for all keyswitch operations.
#[derive(Debug)]
pub enum KeyswitchError {
    // ── I/O & filesystem ───────────────────────────────────────────────
    /// Filesystem or I/O operation failed.
    Storage {
        message: String,
        source: std::io::Error,
        context: ErrorContext,
    },

    /// A required file does not exist.
    NotFound {
        message: String,
        context: ErrorContext,
    },

    // ── Parsing ────────────────────────────────────────────────────────
    /// A key file could not be parsed.
    KeyFile {
        problem: KeyFileProblem,
        context: ErrorContext,
    },

    /// Any other on-disk structure (secrets payload) could not be parsed.
    Format {
        message: String,
        context: ErrorContext,
    },

    /// KDL config file parsing error.
    Config {
        message: String,
        context: ErrorContext,
    },

    // ── Encryption ─────────────────────────────────────────────────────
    /// Encryption or decryption was rejected.
    Crypto {
        message: String,
        context: ErrorContext,
    },

    // ── Caller input ───────────────────────────────────────────────────
    /// An argument was empty or invalid before any I/O was attempted.
    Validation {
        message: String,
        context: ErrorContext,
    },

    // ── Rotation escalation ────────────────────────────────────────────
    /// Rollback after a failed rotation failed too.
    ManualRecovery {
        message: String,
        backup: PathBuf,
        context: ErrorContext,
    },
}

// ── Display ────────────────────────────────────────────────────────────

impl fmt::Display for KeyswitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyswitchError::Storage {
                message, source, ..
            } => write!(f, "{}: {}", message, source),
            KeyswitchError::NotFound { message, .. } => write!(f, "{}", message),
            KeyswitchError::KeyFile { problem, context } => match context.get("path") {
                Some(path) => write!(f, "{}: {}", problem, path),
                None => write!(f, "{}", problem),
            },
            KeyswitchError::Format { message, .. } => write!(f, "format error: {}", message),
            KeyswitchError::Config { message, .. } => write!(f, "config error: {}", message),
            KeyswitchError::Crypto { message, .. } => write!(f, "decryption error: {}", message),
            KeyswitchError::Validation { message, .. } => write!(f, "{}", message),
            KeyswitchError::ManualRecovery {
                message, backup, ..
            } => write!(
                f,
                "CRITICAL: {} (manual recovery required, backup key at {})",
                message,
                backup.display()
            ),
        }
    }
}

impl std::error::Error for KeyswitchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyswitchError::Storage { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ── From implementations for common error types ────────────────────────

impl From<std::io::Error> for KeyswitchError {
    fn from(e: std::io::Error) -> Self {
        KeyswitchError::Storage {
            message: "I/O error".to_string(),
            source: e,
            context: ErrorContext::new(),
        }
    }
}

impl From<serde_json::Error> for KeyswitchError {
    fn from(e: serde_json::Error) -> Self {
        KeyswitchError::format(format!("JSON error: {}", e))
    }
}

// ── Convenience constructors ───────────────────────────────────────────

impl KeyswitchError {
    /// Create a storage error for an I/O failure on `path`.
    pub fn storage(message: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        KeyswitchError::Storage {
            message: format!("{} {}", message.into(), path.display()),
            source,
            context: ErrorContext::for_path(path),
        }
    }

    /// Classify an I/O failure while opening `path` for reading: a missing
    /// file becomes [`ErrorKind::NotFound`], everything else is storage.
    pub fn read_failed(what: &str, path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            KeyswitchError::NotFound {
                message: format!("{} not found: {}", what, path.display()),
                context: ErrorContext::for_path(path),
            }
        } else {
            KeyswitchError::storage(format!("failed to read {}", what), path, source)
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        KeyswitchError::NotFound {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a key file format error for `path`.
    pub fn key_file(problem: KeyFileProblem, path: &Path) -> Self {
        KeyswitchError::KeyFile {
            problem,
            context: ErrorContext::for_path(path),
        }
    }

    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        KeyswitchError::Format {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a cryptographic error.
    pub fn crypto(message: impl Into<String>) -> Self {
        KeyswitchError::Crypto {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        KeyswitchError::Validation {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        KeyswitchError::Config {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create the rotation escalation error naming the surviving backup.
    pub fn manual_recovery(message: impl Into<String>, backup: &Path) -> Self {
        KeyswitchError::ManualRecovery {
            message: message.into(),
            backup: backup.to_path_buf(),
            context: ErrorContext::for_path(backup),
        }
    }

    /// The coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeyswitchError::Storage { .. } => ErrorKind::Storage,
            KeyswitchError::NotFound { .. } => ErrorKind::NotFound,
            KeyswitchError::KeyFile { .. } | KeyswitchError::Format { .. } => ErrorKind::Format,
            KeyswitchError::Config { .. } => ErrorKind::Config,
            KeyswitchError::Crypto { .. } => ErrorKind::Crypto,
            KeyswitchError::Validation { .. } => ErrorKind::Validation,
            KeyswitchError::ManualRecovery { .. } => ErrorKind::ManualRecovery,
        }
    }

    /// Structured details attached to this error.
    pub fn context(&self) -> &ErrorContext {
        match self {
            KeyswitchError::Storage { context, .. }
            | KeyswitchError::NotFound { context, .. }
            | KeyswitchError::KeyFile { context, .. }
            | KeyswitchError::Format { context, .. }
            | KeyswitchError::Config { context, .. }
            | KeyswitchError::Crypto { context, .. }
            | KeyswitchError::Validation { context, .. }
            | KeyswitchError::ManualRecovery { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            KeyswitchError::Storage { context, .. }
            | KeyswitchError::NotFound { context, .. }
            | KeyswitchError::KeyFile { context, .. }
            | KeyswitchError::Format { context, .. }
            | KeyswitchError::Config { context, .. }
            | KeyswitchError::Crypto { context, .. }
            | KeyswitchError::Validation { context, .. }
            | KeyswitchError::ManualRecovery { context, .. } => context,
        }
    }

    /// Attach a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().insert(key, value);
        self
    }

    /// Attach a human remediation hint.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        self.with_context("hint", hint)
    }

    /// Attach the path involved, unless one is already recorded.
    pub fn with_path(mut self, path: &Path) -> Self {
        if self.context().get("path").is_none() {
            self.context_mut().insert("path", path.display().to_string());
        }
        self
    }

    /// The remediation hint, if any.
    pub fn hint(&self) -> Option<&str> {
        self.context().get("hint")
    }

    /// The key file problem, for format errors raised while loading keys.
    pub fn key_file_problem(&self) -> Option<KeyFileProblem> {
        match self {
            KeyswitchError::KeyFile { problem, .. } => Some(*problem),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using KeyswitchError.
pub type Result<T> = std::result::Result<T, KeyswitchError>;
