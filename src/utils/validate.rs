//! Name validation shared by secret keys and environment variable names.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{KeyswitchError, Result};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Whether `name` is a portable identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Check that `name` is usable as a secret key and as an environment
/// variable name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(KeyswitchError::validation("name cannot be empty"));
    }
    if !is_valid_name(name) {
        return Err(KeyswitchError::validation(format!(
            "invalid name '{}': use letters, digits and underscores, not starting with a digit",
            name
        )));
    }
    Ok(())
}
