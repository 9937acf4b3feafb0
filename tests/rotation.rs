//! Key rotation, including forced failures through the writer seam.

use std::fs;
use std::path::{Path, PathBuf};

use keyswitch::error::ErrorKind;
use keyswitch::rotation::{KeyRotator, RotationOutcome, SecretsWriter};
use keyswitch::{KeyswitchError, keystore, vault};

const PAYLOAD: &[u8] = b"ANTHROPIC_API_KEY=sk-ant-1\nOPENAI_API_KEY=sk-1\n";

fn setup(with_secrets: bool) -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let key = keystore::key_path(dir.path());
    let secrets = vault::secrets_path(dir.path());
    keystore::generate(&key).unwrap();
    if with_secrets {
        vault::encrypt(&secrets, &key, PAYLOAD).unwrap();
    }
    (dir, key, secrets)
}

fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().ends_with(suffix))
        .collect()
}

/// Fails every write, leaving the blob untouched.
struct FailingWriter;

impl SecretsWriter for FailingWriter {
    fn write(&self, _: &Path, _: &Path, _: &[u8]) -> keyswitch::Result<()> {
        Err(KeyswitchError::storage(
            "failed to write secrets",
            Path::new("/read-only/secrets.age"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only filesystem"),
        ))
    }
}

/// Destroys the key backup before failing, so the rollback cannot succeed.
struct BackupDestroyingWriter {
    dir: PathBuf,
}

impl SecretsWriter for BackupDestroyingWriter {
    fn write(&self, _: &Path, _: &Path, _: &[u8]) -> keyswitch::Result<()> {
        for backup in files_with_suffix(&self.dir, ".bak") {
            fs::remove_file(backup).unwrap();
        }
        Err(KeyswitchError::validation("simulated failure"))
    }
}

/// Replaces the blob, then reports a failure from a later step.
struct CommitThenFailWriter;

impl SecretsWriter for CommitThenFailWriter {
    fn write(&self, secrets_path: &Path, key_path: &Path, plaintext: &[u8]) -> keyswitch::Result<()> {
        vault::encrypt_atomic(secrets_path, key_path, plaintext)?;
        Err(KeyswitchError::storage(
            "failed to set permissions on",
            secrets_path,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "operation not permitted"),
        ))
    }
}

#[test]
fn test_rotate_without_secrets_replaces_key() {
    let (dir, key, secrets) = setup(false);
    let before = fs::read_to_string(&key).unwrap();

    let outcome = KeyRotator::new(&key, &secrets).rotate().unwrap();
    let after = fs::read_to_string(&key).unwrap();

    assert!(matches!(outcome, RotationOutcome::KeyOnly { .. }));
    assert_ne!(before, after);
    assert!(keystore::load_key_pair(&key).is_ok());
    assert!(!secrets.exists());
    assert!(files_with_suffix(dir.path(), ".bak").is_empty());
}

#[test]
fn test_rotate_preserves_plaintext() {
    let (dir, key, secrets) = setup(true);
    let old_key = fs::read(&key).unwrap();
    let old_plaintext = vault::decrypt(&secrets, &key).unwrap().expose_bytes().to_vec();

    let outcome = KeyRotator::new(&key, &secrets).rotate().unwrap();
    assert_eq!(
        outcome,
        RotationOutcome::Reencrypted {
            recipient: keystore::load_recipient(&key).unwrap().to_string(),
            leftover_backup: None,
        }
    );

    assert_ne!(fs::read(&key).unwrap(), old_key);
    let new_plaintext = vault::decrypt(&secrets, &key).unwrap();
    assert_eq!(new_plaintext.expose_bytes(), old_plaintext.as_slice());

    // The old key no longer opens the blob
    let old_key_path = dir.path().join("old.key");
    fs::write(&old_key_path, &old_key).unwrap();
    assert_eq!(
        vault::decrypt(&secrets, &old_key_path).unwrap_err().kind(),
        ErrorKind::Crypto
    );

    assert!(files_with_suffix(dir.path(), ".bak").is_empty());
    assert!(files_with_suffix(dir.path(), ".tmp").is_empty());
}

#[test]
fn test_rotate_twice() {
    let (_dir, key, secrets) = setup(true);
    let rotator = KeyRotator::new(&key, &secrets);
    let first = rotator.rotate().unwrap();
    let second = rotator.rotate().unwrap();

    assert_ne!(first.recipient(), second.recipient());
    assert_eq!(vault::decrypt(&secrets, &key).unwrap().expose_bytes(), PAYLOAD);
}

#[test]
fn test_unreadable_start_state_mutates_nothing() {
    let (dir, key, secrets) = setup(true);
    let other = dir.path().join("other.key");
    keystore::generate(&other).unwrap();
    let before = fs::read(&other).unwrap();

    // A key that cannot open the blob
    let err = KeyRotator::new(&other, &secrets).rotate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Crypto);
    assert_eq!(fs::read(&other).unwrap(), before);
    assert!(files_with_suffix(dir.path(), ".bak").is_empty());

    // The real pair is untouched too
    assert_eq!(vault::decrypt(&secrets, &key).unwrap().expose_bytes(), PAYLOAD);
}

#[test]
fn test_failed_reencryption_restores_original_key() {
    let (dir, key, secrets) = setup(true);
    let old_key = fs::read(&key).unwrap();
    let old_blob = fs::read(&secrets).unwrap();

    let err = KeyRotator::with_writer(&key, &secrets, FailingWriter)
        .rotate()
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(err.context().get("rolled_back"), Some("true"));
    assert!(err.hint().is_some());

    assert_eq!(fs::read(&key).unwrap(), old_key);
    assert_eq!(fs::read(&secrets).unwrap(), old_blob);
    assert_eq!(vault::decrypt(&secrets, &key).unwrap().expose_bytes(), PAYLOAD);
    assert!(files_with_suffix(dir.path(), ".bak").is_empty());
}

#[test]
fn test_failed_rollback_requires_manual_recovery() {
    let (dir, key, secrets) = setup(true);

    let writer = BackupDestroyingWriter {
        dir: dir.path().to_path_buf(),
    };
    let err = KeyRotator::with_writer(&key, &secrets, writer)
        .rotate()
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ManualRecovery);
    let message = err.to_string();
    assert!(message.contains("keyswitch.key."));
    assert!(message.contains(".bak"));
    assert!(err.hint().unwrap().contains(&key.display().to_string()));
}

#[test]
fn test_failure_after_blob_replaced_keeps_new_key() {
    let (dir, key, secrets) = setup(true);
    let old_key = fs::read(&key).unwrap();

    let err = KeyRotator::with_writer(&key, &secrets, CommitThenFailWriter)
        .rotate()
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(err.context().get("rolled_back"), Some("false"));
    assert!(!err.hint().unwrap().contains("unchanged"));

    // The key on disk is the new one and it opens the re-encrypted blob
    assert_ne!(fs::read(&key).unwrap(), old_key);
    assert_eq!(vault::decrypt(&secrets, &key).unwrap().expose_bytes(), PAYLOAD);
    assert!(files_with_suffix(dir.path(), ".bak").is_empty());
}
