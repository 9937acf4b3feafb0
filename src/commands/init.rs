//! Init and key command handlers.

use crate::config::Config;
use crate::error::Result;
use crate::keystore;

/// Handle `keyswitch init`: create the config directory and key pair if missing.
pub fn handle_init(config: &Config) -> Result<()> {
    let dir = config.config_dir();
    let created = keystore::ensure_exists(&dir)?;
    let pair = keystore::load_key_pair(&config.key_path())?;

    if created {
        println!("Created key pair at: {}", config.key_path().display());
    } else {
        println!("Key pair already exists at: {}", config.key_path().display());
    }
    println!("Public key: {}", pair.recipient_string());
    Ok(())
}

/// Handle `keyswitch key`: print the public recipient.
pub fn handle_key(config: &Config) -> Result<()> {
    let recipient = keystore::load_recipient(&config.key_path())
        .map_err(|e| e.with_hint("run 'keyswitch init' to create a key pair"))?;
    println!("{}", recipient);
    Ok(())
}
