//! Encrypted-at-rest storage of the secrets blob.
//!
//! The blob is a single binary age envelope encrypted to the recipient in
//! the key file. It is always rewritten in full, never patched. Decryption
//! reads the whole file into memory first, so every failure after that
//! point is a cryptographic rejection rather than an I/O problem:
//!
//! | failure                         | kind                  |
//! |---------------------------------|-----------------------|
//! | secrets file missing            | `NotFound`            |
//! | key file missing / malformed    | `NotFound` / `Format` |
//! | wrong key, tampered, truncated  | `Crypto`              |

mod entries;
mod secret_bytes;

pub use entries::SecretsMap;
pub use secret_bytes::{SecretBytes, SecretBytesHandle};

use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use zeroize::Zeroize;

use crate::error::{KeyswitchError, Result};
use crate::keystore;
use crate::utils::{OpenMode, PendingFile, open_private};

/// File name of the secrets blob inside a configuration directory.
pub const SECRETS_FILE_NAME: &str = "secrets.age";

/// Path of the secrets blob inside `dir`.
pub fn secrets_path(dir: &Path) -> PathBuf {
    dir.join(SECRETS_FILE_NAME)
}

/// Encrypt `plaintext` to `recipient`, streaming the envelope into `out`.
fn encrypt_into<W: Write>(
    recipient: &age::x25519::Recipient,
    plaintext: &[u8],
    out: W,
    path: &Path,
) -> Result<W> {
    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(recipient as &dyn age::Recipient))
            .map_err(|e| KeyswitchError::crypto(format!("failed to create encryptor: {}", e)))?;

    let write_err = |e: std::io::Error| KeyswitchError::storage("failed to write secrets to", path, e);

    let mut writer = encryptor.wrap_output(out).map_err(write_err)?;
    writer.write_all(plaintext).map_err(write_err)?;
    writer.finish().map_err(write_err)
}

/// Encrypt `plaintext` under the recipient in `key_path` and write the
/// envelope to `secrets_path`, creating or truncating it.
///
/// If writing fails the truncated file is left behind; it is never reported
/// as success, and it is truncated again by the next successful call.
pub fn encrypt(secrets_path: &Path, key_path: &Path, plaintext: &[u8]) -> Result<()> {
    let recipient = keystore::load_recipient(key_path)?;

    let file = open_private(secrets_path, OpenMode::Truncate, false)
        .map_err(|e| KeyswitchError::storage("failed to open secrets file", secrets_path, e))?;

    let writer = encrypt_into(&recipient, plaintext, BufWriter::new(file), secrets_path)?;
    let file = writer
        .into_inner()
        .map_err(|e| KeyswitchError::storage("failed to flush", secrets_path, e.into_error()))?;
    file.sync_all()
        .map_err(|e| KeyswitchError::storage("failed to sync", secrets_path, e))?;

    tracing::debug!(path = %secrets_path.display(), bytes = plaintext.len(), "encrypted secrets");
    Ok(())
}

/// Like [`encrypt`], but writes a temporary sibling file and renames it over
/// `secrets_path`, so a failure at any point leaves the previous blob intact.
pub fn encrypt_atomic(secrets_path: &Path, key_path: &Path, plaintext: &[u8]) -> Result<()> {
    let recipient = keystore::load_recipient(key_path)?;

    let mut pending = PendingFile::create(secrets_path)?;
    let temp_path = pending.temp_path().to_path_buf();
    {
        let file = pending.file_mut()?;
        let mut writer = encrypt_into(&recipient, plaintext, BufWriter::new(file), &temp_path)?;
        writer
            .flush()
            .map_err(|e| KeyswitchError::storage("failed to flush", &temp_path, e))?;
    }
    // The temporary file is created 0600, so the renamed blob already is.
    pending.commit()?;

    tracing::debug!(path = %secrets_path.display(), bytes = plaintext.len(), "atomically encrypted secrets");
    Ok(())
}

/// Decrypt the secrets blob at `secrets_path` with the identity in `key_path`.
pub fn decrypt(secrets_path: &Path, key_path: &Path) -> Result<SecretBytes> {
    let identity = keystore::load_identity(key_path)?;

    let ciphertext = fs::read(secrets_path)
        .map_err(|e| KeyswitchError::read_failed("secrets file", secrets_path, e))?;

    decrypt_bytes(&ciphertext, &identity)
        .map_err(|e| {
            e.with_path(secrets_path).with_hint(
                "the secrets file does not match this key; restore both from a backup",
            )
        })
}

/// Identical to [`decrypt`], but returns a handle the caller releases explicitly.
pub fn decrypt_to_zeroizable(secrets_path: &Path, key_path: &Path) -> Result<SecretBytesHandle> {
    decrypt(secrets_path, key_path).map(SecretBytesHandle::new)
}

fn decrypt_bytes(ciphertext: &[u8], identity: &age::x25519::Identity) -> Result<SecretBytes> {
    let decryptor = age::Decryptor::new(ciphertext)
        .map_err(|e| KeyswitchError::crypto(format!("not a valid envelope: {}", e)))?;

    let mut reader = decryptor
        .decrypt(std::iter::once(identity as &dyn age::Identity))
        .map_err(|e| KeyswitchError::crypto(e.to_string()))?;

    // Plaintext is never longer than the envelope, so this buffer never
    // reallocates and leaves no unzeroized copies behind.
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    if let Err(e) = reader.read_to_end(&mut plaintext) {
        plaintext.zeroize();
        return Err(KeyswitchError::crypto(format!(
            "envelope failed authentication: {}",
            e
        )));
    }

    Ok(SecretBytes::new(plaintext))
}

/// Decrypt and parse the secrets blob. A missing blob is an empty map.
pub fn load_map(secrets_path: &Path, key_path: &Path) -> Result<SecretsMap> {
    if !secrets_path.exists() {
        return Ok(SecretsMap::new());
    }
    let mut plaintext = decrypt(secrets_path, key_path)?;
    let map = SecretsMap::parse(plaintext.expose_str()?);
    plaintext.close();
    map
}

/// Serialize `map` and atomically re-encrypt the blob.
pub fn store_map(secrets_path: &Path, key_path: &Path, map: &SecretsMap) -> Result<()> {
    let plaintext = map.to_plaintext();
    encrypt_atomic(secrets_path, key_path, plaintext.as_bytes())
}
