//! Run command handler - hands one secret to a child process.

use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::config::{Config, ProviderConfig};
use crate::error::{KeyswitchError, Result};
use crate::handoff;
use crate::utils::validate_name;
use crate::vault;

/// Look up the provider's secret in the vault.
fn resolve_secret(config: &Config, provider: &ProviderConfig) -> Result<Zeroizing<String>> {
    let name = provider.secret_name();
    let map = vault::load_map(&config.secrets_path(), &config.key_path())?;
    map.get(&name)
        .map(|v| Zeroizing::new(v.to_string()))
        .ok_or_else(|| {
            KeyswitchError::not_found(format!(
                "no secret named '{}' for provider '{}'",
                name, provider.id
            ))
            .with_hint(format!("run 'keyswitch set {}'", name))
        })
}

/// Non-secret variables passed to the child as-is.
fn plain_env(provider: &ProviderConfig) -> Result<Vec<(String, String)>> {
    let mut env = Vec::new();
    match (&provider.base_url, &provider.base_url_env) {
        (Some(url), Some(var)) => {
            validate_name(var)?;
            env.push((var.clone(), url.clone()));
        }
        (Some(_), None) => {
            tracing::warn!(provider = %provider.id, "base-url is set without base-url-env; ignoring it");
        }
        _ => {}
    }
    Ok(env)
}

fn resolve_program(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|e| {
        KeyswitchError::not_found(format!("program '{}' not found: {}", program, e))
            .with_hint("check the name or pass an absolute path")
    })
}

/// Handle `keyswitch run`. Returns the child's exit code.
pub fn handle_run(
    config: &Config,
    provider_id: &str,
    env_var: Option<String>,
    command: &[String],
) -> Result<i32> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| KeyswitchError::validation("no program given"))?;

    let provider = config.resolve_provider(provider_id);
    let env_var = env_var.unwrap_or_else(|| config.env_var_for(&provider));
    validate_name(&env_var)?;
    let extra_env = plain_env(&provider)?;
    let program = resolve_program(program)?;

    let auth_dir = handoff::create_temp_auth_dir()?;
    let token_path = {
        let secret = resolve_secret(config, &provider)?;
        handoff::write_token_file(auth_dir.path(), secret.as_bytes())?
    };
    let script = handoff::generate_launcher_script(
        auth_dir.path(),
        &token_path,
        &program,
        args,
        Some(&env_var),
    )?;

    let mut cmd = script.command();
    cmd.envs(extra_env);
    tracing::debug!(provider = %provider.id, program = %program.display(), env_var = %env_var, "starting launcher");
    let status = cmd
        .status()
        .map_err(|e| KeyswitchError::storage("failed to start launcher", &script.path, e))?;

    if token_path.exists() {
        tracing::warn!(path = %token_path.display(), "launcher did not consume the token file");
    }
    auth_dir.close()?;

    Ok(exit_code(status))
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
