//! Quoting of target arguments for generated launcher scripts.

/// Quote `arg` as a PowerShell literal.
///
/// The result is wrapped in single quotes with embedded single quotes
/// doubled. The interpreter's special characters are additionally
/// backtick-escaped, so the literal stays inert even when it is spliced
/// somewhere outside its quotes. Inside single quotes PowerShell treats
/// backticks literally. Never fails; the empty string becomes `''`.
pub fn escape_shell_arg(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('\'');
    for c in arg.chars() {
        match c {
            '\'' => out.push_str("''"),
            '`' => out.push_str("``"),
            '$' => out.push_str("`$"),
            '"' => out.push_str("`\""),
            '\n' => out.push_str("`n"),
            '\r' => out.push_str("`r"),
            '\t' => out.push_str("`t"),
            '\u{8}' => out.push_str("`b"),
            '\0' => out.push_str("`0"),
            ';' => out.push_str("`;"),
            '|' => out.push_str("`|"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

/// Quote a path as a plain PowerShell single-quoted literal, `'` doubled.
///
/// Unlike [`escape_shell_arg`] nothing else is touched, so `$` or `;` in a
/// path such as `\\srv\C$\tools` survive.
pub fn quote_powershell(path: &str) -> String {
    format!("'{}'", path.replace('\'', "''"))
}

/// Quote `arg` for a POSIX shell: single quotes, with `'` written as `'\''`.
pub fn quote_posix(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_literal_cases() {
        assert_eq!(escape_shell_arg(""), "''");
        assert_eq!(escape_shell_arg("can't"), "'can''t'");
        assert_eq!(escape_shell_arg("$HOME"), "'`$HOME'");
        assert_eq!(escape_shell_arg("plain"), "'plain'");
    }

    #[test]
    fn test_escape_command_substitution() {
        assert_eq!(escape_shell_arg("$(whoami)"), "'`$(whoami)'");
        assert_eq!(escape_shell_arg("`whoami`"), "'``whoami``'");
        assert_eq!(escape_shell_arg("a;b|c"), "'a`;b`|c'");
        assert_eq!(escape_shell_arg("say \"hi\""), "'say `\"hi`\"'");
    }

    #[test]
    fn test_escape_control_characters() {
        assert_eq!(escape_shell_arg("a\nb\rc\td"), "'a`nb`rc`td'");
        assert_eq!(escape_shell_arg("x\u{8}y\0z"), "'x`by`0z'");
    }

    #[test]
    fn test_escape_is_single_pass() {
        // The backtick introduced for '$' is not escaped a second time
        assert_eq!(escape_shell_arg("`$"), "'```$'");
    }

    #[test]
    fn test_quote_powershell_keeps_path_verbatim() {
        assert_eq!(quote_powershell(r"\\srv\C$\tools\cli.exe"), r"'\\srv\C$\tools\cli.exe'");
        assert_eq!(quote_powershell(r"C:\Users\o'neil\a;b|c"), r"'C:\Users\o''neil\a;b|c'");
    }

    #[test]
    fn test_quote_posix() {
        assert_eq!(quote_posix(""), "''");
        assert_eq!(quote_posix("can't"), "'can'\\''t'");
        assert_eq!(quote_posix("$(touch x)"), "'$(touch x)'");
    }
}
