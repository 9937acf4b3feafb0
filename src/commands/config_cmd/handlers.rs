//! Public command handlers for config management.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::{KeyswitchError, Result};

/// Handle `keyswitch config generate`.
pub fn handle_generate(path: Option<PathBuf>, overwrite: bool) -> Result<()> {
    let config_path = Config::generate_config_file(path, overwrite)?;
    println!("Config file generated at: {}", config_path.display());
    Ok(())
}

/// Handle `keyswitch config list` (also the bare `keyswitch config`).
pub fn handle_list(config: &Config) -> Result<()> {
    match Config::find_existing_config() {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
    println!();
    println!("Current Configuration:");
    println!("  config_dir: {}", config.config_dir().display());
    println!("  env_var: {}", config.default_env_var());
    println!("  key file: {}", config.key_path().display());
    println!("  secrets file: {}", config.secrets_path().display());
    println!();
    print_providers(config);
    Ok(())
}

/// Handle `keyswitch config get`.
pub fn handle_get(config: &Config, key: &str) -> Result<()> {
    println!("{}", config.get_default(key)?);
    Ok(())
}

/// Handle `keyswitch config set`: update the config file in use.
///
/// Edits the file as written, ignoring `--config-dir`.
pub fn handle_set(key: &str, value: &str) -> Result<()> {
    let config_path = Config::find_existing_config().ok_or_else(|| {
        KeyswitchError::config("config file not found")
            .with_hint("run 'keyswitch config generate' first")
    })?;

    let mut config = Config::load_from_path(&config_path)?;
    config.set_default(key, value)?;
    config.save(&config_path)?;
    println!("Updated {} = {}", key, value);
    Ok(())
}

/// Handle `keyswitch config providers`.
pub fn handle_providers(config: &Config) -> Result<()> {
    print_providers(config);
    Ok(())
}

fn print_providers(config: &Config) {
    if config.providers.is_empty() {
        println!("No providers configured.");
        println!("Unknown provider ids read <ID>_API_KEY and export it as {}.", config.default_env_var());
        return;
    }

    println!("Configured Providers:");
    for p in &config.providers {
        print!(
            "  {} secret={} env_var={}",
            p.id,
            p.secret_name(),
            config.env_var_for(p)
        );
        if let (Some(url), Some(var)) = (&p.base_url, &p.base_url_env) {
            print!(" {}={}", var, url);
        }
        println!();
    }
}
