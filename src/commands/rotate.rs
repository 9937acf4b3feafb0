//! Rotate command handler.

use crate::config::Config;
use crate::error::Result;
use crate::rotation::{KeyRotator, RotationOutcome};

/// Handle `keyswitch rotate`.
pub fn handle_rotate(config: &Config) -> Result<()> {
    let rotator = KeyRotator::new(config.key_path(), config.secrets_path());

    match rotator.rotate()? {
        RotationOutcome::KeyOnly { recipient } => {
            println!("Rotated key (no secrets stored yet).");
            println!("Public key: {}", recipient);
        }
        RotationOutcome::Reencrypted {
            recipient,
            leftover_backup,
        } => {
            println!("Rotated key and re-encrypted secrets.");
            println!("Public key: {}", recipient);
            if let Some(backup) = leftover_backup {
                eprintln!(
                    "warning: could not delete old key backup {}; delete it manually",
                    backup.display()
                );
            }
        }
    }
    Ok(())
}
