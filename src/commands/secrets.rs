//! Secret management handlers: set, list and remove.

use std::io::{self, BufRead, Write};

use serde::Serialize;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{KeyswitchError, Result};
use crate::keystore;
use crate::utils::validate_name;
use crate::vault;

/// Prompt for a secret value with hidden input
fn prompt_value(name: &str) -> Result<Zeroizing<String>> {
    eprint!("Value for {}: ", name);
    io::stderr().flush()?;
    let value = Zeroizing::new(rpassword::read_password()?);

    if value.is_empty() {
        return Err(KeyswitchError::validation("value cannot be empty"));
    }
    Ok(value)
}

/// Read a secret value from the first line of `reader`.
fn read_value(mut reader: impl BufRead) -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    reader.read_line(&mut line)?;

    let value = Zeroizing::new(line.trim_end_matches(['\n', '\r']).to_string());
    if value.is_empty() {
        return Err(KeyswitchError::validation("value cannot be empty")
            .with_hint("pipe the value on standard input, e.g. `pass show openai | keyswitch set NAME --stdin`"));
    }
    Ok(value)
}

/// Handle `keyswitch set`: store or replace a secret.
pub fn handle_set(config: &Config, name: &str, from_stdin: bool) -> Result<()> {
    // Reject bad names before prompting
    validate_name(name)?;

    let value = if from_stdin {
        read_value(io::stdin().lock())?
    } else {
        prompt_value(name)?
    };

    if keystore::ensure_exists(&config.config_dir())? {
        eprintln!("Created key pair at: {}", config.key_path().display());
    }

    let secrets_path = config.secrets_path();
    let key_path = config.key_path();
    let mut map = vault::load_map(&secrets_path, &key_path)?;
    let replaced = map.insert(name, &value)?;
    vault::store_map(&secrets_path, &key_path, &map)?;

    if replaced {
        println!("Updated {}", name);
    } else {
        println!("Stored {}", name);
    }
    Ok(())
}

/// `list --json` output.
#[derive(Debug, Serialize)]
struct SecretListing<'a> {
    secrets_file: String,
    names: Vec<&'a str>,
}

/// Handle `keyswitch list`: print secret names, never values.
pub fn handle_list(config: &Config, json: bool) -> Result<()> {
    let secrets_path = config.secrets_path();
    let map = vault::load_map(&secrets_path, &config.key_path())?;
    let names: Vec<&str> = map.names().collect();

    if json {
        let listing = SecretListing {
            secrets_file: secrets_path.display().to_string(),
            names,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if names.is_empty() {
        eprintln!("No secrets stored. Run 'keyswitch set <NAME>' to add one.");
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

/// Handle `keyswitch remove`.
pub fn handle_remove(config: &Config, name: &str) -> Result<()> {
    let secrets_path = config.secrets_path();
    let key_path = config.key_path();
    let mut map = vault::load_map(&secrets_path, &key_path)?;

    if !map.remove(name) {
        return Err(KeyswitchError::not_found(format!("no secret named '{}'", name))
            .with_hint("run 'keyswitch list' to see stored names"));
    }
    vault::store_map(&secrets_path, &key_path, &map)?;
    println!("Removed {}", name);
    Ok(())
}
