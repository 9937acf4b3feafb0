//! `KEY=VALUE` payload stored inside the secrets blob.
//!
//! One record per line, split on the first `=`, blank lines ignored. Values
//! are held in zeroizing strings and the serialized form is sorted by key.

use std::collections::BTreeMap;

use zeroize::Zeroizing;

use crate::error::{KeyswitchError, Result};
use crate::utils::{is_valid_name, validate_name};

fn validate_value(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(KeyswitchError::validation(format!(
            "value for '{}' cannot be empty",
            name
        )));
    }
    if value.contains(['\n', '\r', '\0']) {
        return Err(KeyswitchError::validation(format!(
            "value for '{}' cannot contain line breaks or NUL bytes",
            name
        )));
    }
    Ok(())
}

/// Decrypted secrets keyed by name.
#[derive(Default)]
pub struct SecretsMap {
    entries: BTreeMap<String, Zeroizing<String>>,
}

impl SecretsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a decrypted payload.
    ///
    /// Errors name the offending line number, never its contents.
    pub fn parse(plaintext: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();

        for (idx, line) in plaintext.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let (name, value) = line.split_once('=').ok_or_else(|| {
                KeyswitchError::format(format!("secrets line {} is not KEY=VALUE", line_no))
            })?;
            let name = name.trim();
            if !is_valid_name(name) {
                return Err(KeyswitchError::format(format!(
                    "secrets line {} has an invalid key",
                    line_no
                )));
            }
            entries.insert(name.to_string(), Zeroizing::new(value.to_string()));
        }

        Ok(Self { entries })
    }

    /// Serialize back to the payload format.
    pub fn to_plaintext(&self) -> Zeroizing<String> {
        let mut out = Zeroizing::new(String::new());
        for (name, value) in &self.entries {
            out.push_str(name);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|v| v.as_str())
    }

    /// Insert or replace a secret. Returns `true` if an old value was replaced.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<bool> {
        validate_name(name)?;
        validate_value(name, value)?;
        Ok(self
            .entries
            .insert(name.to_string(), Zeroizing::new(value.to_string()))
            .is_some())
    }

    /// Remove a secret. Returns `true` if it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Secret names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for SecretsMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_records() {
        let map = SecretsMap::parse("OPENAI=sk-1\n\nANTHROPIC=sk-a=b\n").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("OPENAI"), Some("sk-1"));
        // Split on the first '=' only
        assert_eq!(map.get("ANTHROPIC"), Some("sk-a=b"));
    }

    #[test]
    fn test_parse_empty_payload() {
        assert!(SecretsMap::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_line_without_leaking() {
        let err = SecretsMap::parse("OK=1\nsk-this-is-secret\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        let msg = err.to_string();
        assert!(msg.contains("line 2"));
        assert!(!msg.contains("sk-this-is-secret"));
    }

    #[test]
    fn test_serialization_is_sorted() {
        let mut map = SecretsMap::new();
        map.insert("ZED", "3").unwrap();
        map.insert("ALPHA", "1").unwrap();
        assert_eq!(map.to_plaintext().as_str(), "ALPHA=1\nZED=3\n");

        let reparsed = SecretsMap::parse(&map.to_plaintext()).unwrap();
        assert_eq!(reparsed.names().collect::<Vec<_>>(), vec!["ALPHA", "ZED"]);
    }

    #[test]
    fn test_insert_validation() {
        let mut map = SecretsMap::new();
        assert_eq!(
            map.insert("1BAD", "x").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            map.insert("HAS SPACE", "x").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            map.insert("GOOD", "multi\nline").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(map.insert("GOOD", "").unwrap_err().kind(), ErrorKind::Validation);

        assert!(!map.insert("GOOD", "v1").unwrap());
        assert!(map.insert("GOOD", "v2").unwrap());
        assert_eq!(map.get("GOOD"), Some("v2"));
        assert!(map.remove("GOOD"));
        assert!(!map.remove("GOOD"));
    }

    #[test]
    fn test_debug_shows_names_only() {
        let mut map = SecretsMap::new();
        map.insert("OPENAI", "sk-hidden").unwrap();
        let debug = format!("{:?}", map);
        assert!(debug.contains("OPENAI"));
        assert!(!debug.contains("sk-hidden"));
    }
}
