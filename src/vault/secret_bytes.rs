//! Zeroizable buffers for decrypted plaintext.

use std::fmt;

use zeroize::Zeroize;

use crate::error::{KeyswitchError, Result};

/// Decrypted bytes owned by the caller for the length of one operation.
///
/// [`clear`](SecretBytes::clear) overwrites every byte with zero and keeps
/// the length; [`close`](SecretBytes::close) zeroizes the whole allocation
/// and detaches it. Both are idempotent, and dropping the value zeroizes it
/// as well, so error returns and panic unwinding never leave plaintext
/// behind in this buffer.
pub struct SecretBytes {
    bytes: Vec<u8>,
}

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn expose_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow the plaintext as UTF-8.
    pub fn expose_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes)
            .map_err(|_| KeyswitchError::format("decrypted secrets are not valid UTF-8"))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Overwrite every byte with zero, keeping the length.
    pub fn clear(&mut self) {
        self.bytes.as_mut_slice().zeroize();
    }

    /// Zeroize and release the buffer. Accessors return empty afterwards.
    pub fn close(&mut self) {
        // Vec::zeroize wipes the full capacity, then truncates.
        self.bytes.zeroize();
        self.bytes = Vec::new();
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.bytes.len())
    }
}

/// A [`SecretBytes`] that the caller must explicitly release.
///
/// Returned by [`crate::vault::decrypt_to_zeroizable`]. Releasing is safe to
/// repeat; once released every accessor sees an empty buffer.
#[derive(Debug)]
pub struct SecretBytesHandle {
    inner: Option<SecretBytes>,
}

impl SecretBytesHandle {
    pub(crate) fn new(secret: SecretBytes) -> Self {
        Self {
            inner: Some(secret),
        }
    }

    pub fn expose_bytes(&self) -> &[u8] {
        self.inner.as_ref().map(|s| s.expose_bytes()).unwrap_or(&[])
    }

    pub fn expose_str(&self) -> Result<&str> {
        match &self.inner {
            Some(secret) => secret.expose_str(),
            None => Ok(""),
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Zeroize and drop the buffer.
    pub fn release(&mut self) {
        if let Some(mut secret) = self.inner.take() {
            secret.close();
        }
    }
}

impl Drop for SecretBytesHandle {
    fn drop(&mut self) {
        self.release();
    }
}
