//! keyswitch - encrypted-at-rest API keys handed to child processes.
//!
//! This crate provides functionality to:
//! - Keep an age X25519 key pair in a two-line, owner-only key file
//! - Encrypt and decrypt a single secrets blob under that key
//! - Rotate the key in place, rolling back when re-encryption fails
//! - Hand one secret to a child process through a self-deleting token file
//!
//! # Example
//!
//! ```no_run
//! use keyswitch::{Config, keystore, vault};
//!
//! fn main() -> keyswitch::Result<()> {
//!     let config = Config::load()?;
//!     keystore::ensure_exists(&config.config_dir())?;
//!
//!     let mut secrets = vault::load_map(&config.secrets_path(), &config.key_path())?;
//!     secrets.insert("OPENAI_API_KEY", "sk-...")?;
//!     vault::store_map(&config.secrets_path(), &config.key_path(), &secrets)?;
//!
//!     for name in secrets.names() {
//!         println!("{}", name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod handoff;
pub mod keystore;
pub mod rotation;
pub mod utils;
pub mod vault;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use error::{ErrorKind, KeyswitchError, Result};
pub use keystore::KeyPair;
pub use rotation::{KeyRotator, RotationOutcome, SecretsWriter};
pub use vault::{SecretBytes, SecretBytesHandle, SecretsMap};
