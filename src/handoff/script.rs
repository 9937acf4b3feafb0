//! Launcher script generation.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{KeyswitchError, Result};
use crate::utils::{OpenMode, open_private, validate_name};

use super::DEFAULT_ENV_VAR;
use super::escape::{escape_shell_arg, quote_posix, quote_powershell};

/// Which script dialect to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPlatform {
    Unix,
    Windows,
}

impl ScriptPlatform {
    /// The dialect for the platform this binary was built for.
    pub fn host() -> Self {
        if cfg!(windows) {
            ScriptPlatform::Windows
        } else {
            ScriptPlatform::Unix
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ScriptPlatform::Unix => "sh",
            ScriptPlatform::Windows => "ps1",
        }
    }
}

/// How the caller has to start a generated script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Executable file with a shebang; run it directly.
    Direct,
    /// Must be handed to PowerShell.
    PowerShell,
}

/// A generated launcher script on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherScript {
    pub path: PathBuf,
    pub mode: ExecutionMode,
}

impl LauncherScript {
    /// A `Command` that runs the script according to its execution mode.
    pub fn command(&self) -> Command {
        match self.mode {
            ExecutionMode::Direct => Command::new(&self.path),
            ExecutionMode::PowerShell => {
                let mut cmd = Command::new("powershell");
                cmd.args([
                    "-NoProfile",
                    "-NonInteractive",
                    "-ExecutionPolicy",
                    "Bypass",
                    "-File",
                ])
                .arg(&self.path);
                cmd
            }
        }
    }
}

/// Write a launcher script for the host platform.
///
/// `env_var_name` defaults to [`DEFAULT_ENV_VAR`].
pub fn generate_launcher_script(
    dir: &Path,
    token_path: &Path,
    target_binary: &Path,
    target_args: &[String],
    env_var_name: Option<&str>,
) -> Result<LauncherScript> {
    generate_launcher_script_for(
        ScriptPlatform::host(),
        dir,
        token_path,
        target_binary,
        target_args,
        env_var_name,
    )
}

/// Write a launcher script in the given dialect.
pub fn generate_launcher_script_for(
    platform: ScriptPlatform,
    dir: &Path,
    token_path: &Path,
    target_binary: &Path,
    target_args: &[String],
    env_var_name: Option<&str>,
) -> Result<LauncherScript> {
    let token = path_arg("token path", token_path)?;
    let binary = path_arg("target binary", target_binary)?;
    if target_args.iter().any(|a| a.contains('\0')) {
        return Err(KeyswitchError::validation(
            "target arguments cannot contain NUL bytes",
        ));
    }
    let env_var = env_var_name.unwrap_or(DEFAULT_ENV_VAR);
    validate_name(env_var)?;

    let (body, mode) = match platform {
        ScriptPlatform::Unix => (
            unix_body(&token, &binary, target_args, env_var),
            ExecutionMode::Direct,
        ),
        ScriptPlatform::Windows => (
            powershell_body(&token, &binary, target_args, env_var),
            ExecutionMode::PowerShell,
        ),
    };

    let path = dir.join(format!(
        "launch-{}.{}",
        uuid::Uuid::new_v4(),
        platform.extension()
    ));
    let executable = platform == ScriptPlatform::Unix;
    let mut file = open_private(&path, OpenMode::CreateNew, executable)
        .map_err(|e| KeyswitchError::storage("failed to create launcher script", &path, e))?;
    file.write_all(body.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| KeyswitchError::storage("failed to write launcher script", &path, e))?;
    // Close before anyone tries to exec it (ETXTBSY).
    drop(file);

    tracing::debug!(path = %path.display(), ?mode, env_var, args = target_args.len(), "generated launcher script");
    Ok(LauncherScript { path, mode })
}

fn path_arg(what: &str, path: &Path) -> Result<String> {
    if path.as_os_str().is_empty() {
        return Err(KeyswitchError::validation(format!("{} cannot be empty", what)));
    }
    let s = path.to_str().ok_or_else(|| {
        KeyswitchError::validation(format!("{} is not valid UTF-8: {}", what, path.display()))
    })?;
    if s.contains('\0') {
        return Err(KeyswitchError::validation(format!(
            "{} cannot contain NUL bytes",
            what
        )));
    }
    Ok(s.to_string())
}

fn unix_body(token: &str, binary: &str, args: &[String], env_var: &str) -> String {
    let token = quote_posix(token);
    let mut exec_line = format!("exec {}", quote_posix(binary));
    for arg in args {
        exec_line.push(' ');
        exec_line.push_str(&quote_posix(arg));
    }

    format!(
        "#!/bin/sh\n\
         {var}=$(cat -- {token}) || {{ rm -f -- {token}; exit 1; }}\n\
         rm -f -- {token}\n\
         export {var}\n\
         {exec_line}\n",
        var = env_var,
        token = token,
        exec_line = exec_line,
    )
}

fn powershell_body(token: &str, binary: &str, args: &[String], env_var: &str) -> String {
    let mut invoke = format!("& {}", quote_powershell(binary));
    for arg in args {
        invoke.push(' ');
        invoke.push_str(&escape_shell_arg(arg));
    }

    format!(
        "$ErrorActionPreference = 'Stop'\r\n\
         $tokenPath = {token}\r\n\
         try {{ $env:{var} = [System.IO.File]::ReadAllText($tokenPath) }} \
         finally {{ Remove-Item -LiteralPath $tokenPath -Force -ErrorAction SilentlyContinue }}\r\n\
         {invoke}\r\n\
         exit $LASTEXITCODE\r\n",
        token = quote_powershell(token),
        var = env_var,
        invoke = invoke,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_launcher_script(
            dir.path(),
            Path::new(""),
            Path::new("/bin/true"),
            &[],
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = generate_launcher_script(
            dir.path(),
            Path::new("/tmp/token"),
            Path::new(""),
            &[],
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Nothing written
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_env_var_and_nul_args_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let token = Path::new("/tmp/token");
        let bin = Path::new("/bin/true");

        let err = generate_launcher_script(dir.path(), token, bin, &[], Some("BAD NAME"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = generate_launcher_script(dir.path(), token, bin, &args(&["a\0b"]), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_unix_body_layout() {
        let dir = tempfile::tempdir().unwrap();
        let script = generate_launcher_script_for(
            ScriptPlatform::Unix,
            dir.path(),
            Path::new("/tmp/auth/token-1"),
            Path::new("/usr/bin/env"),
            &args(&["it's", "$HOME"]),
            None,
        )
        .unwrap();
        assert_eq!(script.mode, ExecutionMode::Direct);
        assert_eq!(script.path.extension().unwrap(), "sh");

        let body = std::fs::read_to_string(&script.path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "#!/bin/sh");
        assert!(lines[1].starts_with("API_KEY=$(cat -- '/tmp/auth/token-1')"));
        assert_eq!(lines[2], "rm -f -- '/tmp/auth/token-1'");
        assert_eq!(lines[3], "export API_KEY");
        assert_eq!(lines[4], "exec '/usr/bin/env' 'it'\\''s' '$HOME'");
    }

    #[test]
    fn test_powershell_body_layout() {
        let dir = tempfile::tempdir().unwrap();
        let script = generate_launcher_script_for(
            ScriptPlatform::Windows,
            dir.path(),
            Path::new("C:\\Temp\\auth\\token-1"),
            Path::new("C:\\Tools\\cli.exe"),
            &args(&["$(whoami)", "a;b"]),
            Some("OPENAI_API_KEY"),
        )
        .unwrap();
        assert_eq!(script.mode, ExecutionMode::PowerShell);
        assert_eq!(script.path.extension().unwrap(), "ps1");

        let body = std::fs::read_to_string(&script.path).unwrap();
        assert!(body.contains("$tokenPath = 'C:\\Temp\\auth\\token-1'"));
        assert!(body.contains("$env:OPENAI_API_KEY = [System.IO.File]::ReadAllText($tokenPath)"));
        assert!(body.contains("Remove-Item -LiteralPath $tokenPath"));
        assert!(body.contains("& 'C:\\Tools\\cli.exe' '`$(whoami)' 'a`;b'"));
        assert!(body.ends_with("exit $LASTEXITCODE\r\n"));
    }

    #[test]
    fn test_powershell_paths_are_not_backtick_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let script = generate_launcher_script_for(
            ScriptPlatform::Windows,
            dir.path(),
            Path::new(r"C:\Users\a$b\token-1"),
            Path::new(r"\\srv\C$\tools\cli.exe"),
            &args(&["$x"]),
            None,
        )
        .unwrap();

        let body = std::fs::read_to_string(&script.path).unwrap();
        assert!(body.contains(r"$tokenPath = 'C:\Users\a$b\token-1'"));
        assert!(body.contains(r"& '\\srv\C$\tools\cli.exe' '`$x'"));
    }

    #[test]
    fn test_script_never_contains_token_contents() {
        let dir = tempfile::tempdir().unwrap();
        let token = dir.path().join("token");
        std::fs::write(&token, "sk-super-secret").unwrap();

        for platform in [ScriptPlatform::Unix, ScriptPlatform::Windows] {
            let script = generate_launcher_script_for(
                platform,
                dir.path(),
                &token,
                Path::new("/bin/true"),
                &[],
                None,
            )
            .unwrap();
            let body = std::fs::read_to_string(&script.path).unwrap();
            assert!(!body.contains("sk-super-secret"));
        }
    }

    #[test]
    fn test_powershell_command_line() {
        let script = LauncherScript {
            path: PathBuf::from("launch.ps1"),
            mode: ExecutionMode::PowerShell,
        };
        let cmd = script.command();
        assert_eq!(cmd.get_program(), "powershell");
        let argv: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(argv.last().map(String::as_str), Some("launch.ps1"));
        assert!(argv.contains(&"-NonInteractive".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_script_is_owner_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = generate_launcher_script_for(
            ScriptPlatform::Unix,
            dir.path(),
            Path::new("/tmp/token"),
            Path::new("/bin/true"),
            &[],
            None,
        )
        .unwrap();
        let mode = std::fs::metadata(&script.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
