//! In-place key rotation with rollback.
//!
//! ```text
//! Idle -> CheckSecrets
//!   no secrets:  ReplaceKeyOnly -> Done
//!   has secrets: DecryptOld -> BackupOldKey -> ReplaceKey -> ReencryptWithNew
//!                  ok:     DeleteBackup -> Done
//!                  failed: RestoreOldKeyFromBackup -> error
//! ```
//!
//! After every call, success or failure, at least one (key file, secrets
//! file) pair on disk decrypts:
//!
//! - nothing is mutated until the current key has decrypted the blob;
//! - the new key only takes effect through an atomic rename;
//! - the blob is re-encrypted through a writer that leaves the old blob in
//!   place on failure, and the old key is then restored from its backup;
//! - if the writer failed after replacing the blob, the new key is kept;
//! - if no key opens the blob, or the restore fails, the error names the
//!   backup file.
//!
//! Concurrent rotation of the same key path from several processes is not
//! supported; the last rename wins.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::error::{KeyswitchError, Result};
use crate::keystore::{self, KeyPair};
use crate::utils::{PendingFile, write_atomic};
use crate::vault;

/// Steps of a rotation, recorded as the `step` context entry of errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStep {
    CheckSecrets,
    ReplaceKeyOnly,
    DecryptOld,
    BackupOldKey,
    ReplaceKey,
    ReencryptWithNew,
    DeleteBackup,
    RestoreOldKeyFromBackup,
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationStep::CheckSecrets => "check_secrets",
            RotationStep::ReplaceKeyOnly => "replace_key_only",
            RotationStep::DecryptOld => "decrypt_old",
            RotationStep::BackupOldKey => "backup_old_key",
            RotationStep::ReplaceKey => "replace_key",
            RotationStep::ReencryptWithNew => "reencrypt_with_new",
            RotationStep::DeleteBackup => "delete_backup",
            RotationStep::RestoreOldKeyFromBackup => "restore_old_key_from_backup",
        };
        f.write_str(name)
    }
}

/// Writes the re-encrypted secrets blob during rotation.
///
/// On failure the blob on disk must still open with either the previous
/// key or the key at `key_path`.
pub trait SecretsWriter {
    fn write(&self, secrets_path: &Path, key_path: &Path, plaintext: &[u8]) -> Result<()>;
}

/// The default writer: temp file plus atomic rename.
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicVaultWriter;

impl SecretsWriter for AtomicVaultWriter {
    fn write(&self, secrets_path: &Path, key_path: &Path, plaintext: &[u8]) -> Result<()> {
        vault::encrypt_atomic(secrets_path, key_path, plaintext)
    }
}

/// Result of a successful rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// There was no secrets blob; only the key was replaced.
    KeyOnly { recipient: String },
    /// The blob was re-encrypted under the new key.
    Reencrypted {
        recipient: String,
        /// Set when the backup of the old key could not be deleted.
        leftover_backup: Option<PathBuf>,
    },
}

impl RotationOutcome {
    /// The new public recipient.
    pub fn recipient(&self) -> &str {
        match self {
            RotationOutcome::KeyOnly { recipient } => recipient,
            RotationOutcome::Reencrypted { recipient, .. } => recipient,
        }
    }
}

/// Replaces the key pair at `key_path`, re-encrypting `secrets_path`.
pub struct KeyRotator<W = AtomicVaultWriter> {
    key_path: PathBuf,
    secrets_path: PathBuf,
    writer: W,
}

impl KeyRotator<AtomicVaultWriter> {
    pub fn new(key_path: impl Into<PathBuf>, secrets_path: impl Into<PathBuf>) -> Self {
        Self::with_writer(key_path, secrets_path, AtomicVaultWriter)
    }

    /// Rotator for the conventional file names inside a configuration directory.
    pub fn for_dir(dir: &Path) -> Self {
        Self::new(keystore::key_path(dir), vault::secrets_path(dir))
    }
}

impl<W: SecretsWriter> KeyRotator<W> {
    pub fn with_writer(
        key_path: impl Into<PathBuf>,
        secrets_path: impl Into<PathBuf>,
        writer: W,
    ) -> Self {
        Self {
            key_path: key_path.into(),
            secrets_path: secrets_path.into(),
            writer,
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn secrets_path(&self) -> &Path {
        &self.secrets_path
    }

    /// Run the rotation.
    pub fn rotate(&self) -> Result<RotationOutcome> {
        let at = |step: RotationStep| {
            move |e: KeyswitchError| e.with_context("step", step.to_string())
        };

        tracing::debug!(step = %RotationStep::CheckSecrets, secrets = %self.secrets_path.display());
        if !self.secrets_path.exists() {
            tracing::debug!(step = %RotationStep::ReplaceKeyOnly);
            let pair = self
                .install_new_key()
                .map_err(at(RotationStep::ReplaceKeyOnly))?;
            tracing::info!(recipient = %pair.recipient_string(), "rotated key (no secrets to re-encrypt)");
            return Ok(RotationOutcome::KeyOnly {
                recipient: pair.recipient_string(),
            });
        }

        tracing::debug!(step = %RotationStep::DecryptOld);
        let mut plaintext = vault::decrypt(&self.secrets_path, &self.key_path)
            .map_err(at(RotationStep::DecryptOld))?;

        tracing::debug!(step = %RotationStep::BackupOldKey);
        let backup = self.backup_old_key().map_err(at(RotationStep::BackupOldKey))?;

        tracing::debug!(step = %RotationStep::ReplaceKey);
        let pair = match self.install_new_key() {
            Ok(pair) => pair,
            Err(e) => {
                // The old key is still in place; the backup is redundant.
                remove_backup(&backup);
                return Err(at(RotationStep::ReplaceKey)(e));
            }
        };

        tracing::debug!(step = %RotationStep::ReencryptWithNew);
        let written = self
            .writer
            .write(&self.secrets_path, &self.key_path, plaintext.expose_bytes());
        plaintext.close();

        match written {
            Ok(()) => {
                tracing::debug!(step = %RotationStep::DeleteBackup);
                let leftover_backup = if remove_backup(&backup) {
                    None
                } else {
                    Some(backup)
                };
                tracing::info!(recipient = %pair.recipient_string(), "rotated key and re-encrypted secrets");
                Ok(RotationOutcome::Reencrypted {
                    recipient: pair.recipient_string(),
                    leftover_backup,
                })
            }
            Err(reencrypt_err) => Err(self.recover(reencrypt_err, &backup)),
        }
    }

    /// Decide which key matches the blob left behind by a failed writer.
    fn recover(&self, reencrypt_err: KeyswitchError, backup: &Path) -> KeyswitchError {
        if opens(&self.secrets_path, backup) {
            tracing::warn!(error = %reencrypt_err, step = %RotationStep::RestoreOldKeyFromBackup, "re-encryption failed, restoring previous key");
            return match self.restore_backup(backup) {
                Ok(()) => reencrypt_err
                    .with_context("step", RotationStep::ReencryptWithNew.to_string())
                    .with_context("rolled_back", "true")
                    .with_hint("the previous key was restored and the secrets file is unchanged"),
                Err(restore_err) => {
                    tracing::error!(backup = %backup.display(), error = %restore_err, "failed to restore previous key");
                    self.manual_recovery(
                        format!(
                            "re-encryption failed ({}) and restoring the previous key failed ({})",
                            reencrypt_err, restore_err
                        ),
                        backup,
                    )
                }
            };
        }

        if opens(&self.secrets_path, &self.key_path) {
            // The blob was replaced before the writer failed: the new key is the live one.
            tracing::warn!(error = %reencrypt_err, "secrets were re-encrypted before the writer failed, keeping the new key");
            remove_backup(backup);
            return reencrypt_err
                .with_context("step", RotationStep::ReencryptWithNew.to_string())
                .with_context("rolled_back", "false")
                .with_hint("the secrets file was re-encrypted and the new key was kept");
        }

        tracing::error!(backup = %backup.display(), error = %reencrypt_err, "neither key opens the secrets file");
        self.manual_recovery(
            format!(
                "re-encryption failed ({}) and neither the previous nor the new key opens the secrets file",
                reencrypt_err
            ),
            backup,
        )
    }

    fn manual_recovery(&self, message: String, backup: &Path) -> KeyswitchError {
        KeyswitchError::manual_recovery(message, backup)
            .with_context("step", RotationStep::RestoreOldKeyFromBackup.to_string())
            .with_context("key_path", self.key_path.display().to_string())
            .with_hint(format!(
                "copy {} over {} to regain access to the secrets file",
                backup.display(),
                self.key_path.display()
            ))
    }

    /// Generate a key pair and atomically rename it over the key path.
    fn install_new_key(&self) -> Result<KeyPair> {
        let pair = KeyPair::generate();
        let mut pending = PendingFile::create(&self.key_path)?;
        pending.write_all(pair.to_file_contents().as_bytes())?;
        pending.commit()?;
        Ok(pair)
    }

    /// Copy the current key file to a fresh, timestamped backup path.
    fn backup_old_key(&self) -> Result<PathBuf> {
        let contents = Zeroizing::new(
            fs::read(&self.key_path)
                .map_err(|e| KeyswitchError::read_failed("key file", &self.key_path, e))?,
        );
        let backup = backup_path(&self.key_path);
        write_atomic(&backup, &contents)?;
        tracing::debug!(backup = %backup.display(), "backed up key file");
        Ok(backup)
    }

    fn restore_backup(&self, backup: &Path) -> Result<()> {
        let contents = Zeroizing::new(
            fs::read(backup).map_err(|e| KeyswitchError::read_failed("key backup", backup, e))?,
        );
        write_atomic(&self.key_path, &contents)?;
        remove_backup(backup);
        Ok(())
    }
}

/// `<key file>.<UTC timestamp>.bak` next to the key file.
pub fn backup_path(key_path: &Path) -> PathBuf {
    let name = key_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| keystore::KEY_FILE_NAME.to_string());
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    key_path.with_file_name(format!("{}.{}.bak", name, stamp))
}

/// Whether the key file at `key_path` decrypts the blob at `secrets_path`.
fn opens(secrets_path: &Path, key_path: &Path) -> bool {
    vault::decrypt(secrets_path, key_path).is_ok()
}

/// Remove a backup file, returning whether it is gone.
fn remove_backup(backup: &Path) -> bool {
    match fs::remove_file(backup) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(backup = %backup.display(), error = %e, "failed to delete key backup");
            false
        }
    }
}
