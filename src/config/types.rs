//! Configuration type definitions.

use knuffel::Decode;
use std::path::PathBuf;

use crate::error::KeyswitchError;
use crate::handoff::DEFAULT_ENV_VAR;
use crate::keystore;
use crate::utils::validate_name;
use crate::vault;

/// Configuration directory used when none is configured.
pub const DEFAULT_CONFIG_DIR: &str = "~/.config/keyswitch";

const SETTINGS: &str = "config_dir, env_var";

/// Expand tilde (~) prefix to the user's home directory.
/// Handles both "~" alone and "~/path/to/something" patterns.
pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Main configuration structure parsed from keyswitch.kdl.
#[derive(Debug, Decode, Clone, Default)]
pub struct Config {
    #[knuffel(child)]
    pub defaults: Option<Defaults>,

    #[knuffel(children(name = "provider"))]
    pub providers: Vec<ProviderConfig>,
}

/// Global settings.
#[derive(Debug, Decode, Clone, Default)]
pub struct Defaults {
    /// Directory holding the key file and the secrets blob.
    #[knuffel(property(name = "config_dir"))]
    pub config_dir: Option<String>,

    /// Environment variable a secret is exported as when a provider names none.
    #[knuffel(property(name = "env_var"))]
    pub env_var: Option<String>,
}

/// A named API provider whose key lives in the secrets blob.
#[derive(Debug, Decode, Clone)]
pub struct ProviderConfig {
    #[knuffel(argument)]
    pub id: String,

    /// Name of the entry in the secrets blob.
    #[knuffel(child, unwrap(argument))]
    pub secret: Option<String>,

    /// Written `env-var` in KDL.
    #[knuffel(child, unwrap(argument))]
    pub env_var: Option<String>,

    #[knuffel(child, unwrap(argument))]
    pub base_url: Option<String>,

    /// Variable `base-url` is exported as.
    #[knuffel(child, unwrap(argument))]
    pub base_url_env: Option<String>,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: None,
            env_var: None,
            base_url: None,
            base_url_env: None,
        }
    }

    /// Secret name, defaulting to `<ID>_API_KEY`.
    pub fn secret_name(&self) -> String {
        self.secret
            .clone()
            .unwrap_or_else(|| default_secret_name(&self.id))
    }
}

/// `openai` -> `OPENAI_API_KEY`, `my-llm` -> `MY_LLM_API_KEY`.
pub fn default_secret_name(provider_id: &str) -> String {
    format!("{}_API_KEY", provider_id.to_uppercase().replace('-', "_"))
}

impl Config {
    /// Configuration directory with `~` expanded.
    pub fn config_dir(&self) -> PathBuf {
        self.defaults
            .as_ref()
            .and_then(|d| d.config_dir.as_deref())
            .map(expand_tilde)
            .unwrap_or_else(|| expand_tilde(DEFAULT_CONFIG_DIR))
    }

    /// Override the configuration directory (from `--config-dir`).
    pub fn with_config_dir(mut self, dir: PathBuf) -> Self {
        let defaults = self.defaults.get_or_insert_with(Defaults::default);
        defaults.config_dir = Some(dir.to_string_lossy().into_owned());
        self
    }

    pub fn key_path(&self) -> PathBuf {
        keystore::key_path(&self.config_dir())
    }

    pub fn secrets_path(&self) -> PathBuf {
        vault::secrets_path(&self.config_dir())
    }

    /// Global default environment variable, `API_KEY` if unset.
    pub fn default_env_var(&self) -> String {
        self.defaults
            .as_ref()
            .and_then(|d| d.env_var.clone())
            .unwrap_or_else(|| DEFAULT_ENV_VAR.to_string())
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Provider settings, falling back to a bare provider for unknown ids.
    pub fn resolve_provider(&self, id: &str) -> ProviderConfig {
        self.provider(id)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::new(id))
    }

    /// Environment variable for a provider's secret.
    pub fn env_var_for(&self, provider: &ProviderConfig) -> String {
        provider
            .env_var
            .clone()
            .unwrap_or_else(|| self.default_env_var())
    }

    /// Update a default setting
    pub fn set_default(&mut self, key: &str, value: &str) -> crate::error::Result<()> {
        let defaults = self.defaults.get_or_insert_with(Defaults::default);
        match key {
            "config_dir" => defaults.config_dir = Some(value.to_string()),
            "env_var" => {
                validate_name(value)?;
                defaults.env_var = Some(value.to_string());
            }
            _ => {
                return Err(KeyswitchError::config(format!(
                    "unknown setting: {}. Valid settings: {}",
                    key, SETTINGS
                )));
            }
        }
        Ok(())
    }

    /// Get a default setting value as string
    pub fn get_default(&self, key: &str) -> crate::error::Result<String> {
        match key {
            "config_dir" => Ok(self.config_dir().to_string_lossy().into_owned()),
            "env_var" => Ok(self.default_env_var()),
            _ => Err(KeyswitchError::config(format!(
                "unknown setting: {}. Valid settings: {}",
                key, SETTINGS
            ))),
        }
    }

    /// Add a provider, replacing one with the same id.
    pub fn add_provider(&mut self, provider: ProviderConfig) {
        self.providers.retain(|p| p.id != provider.id);
        self.providers.push(provider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_secret_name() {
        assert_eq!(default_secret_name("openai"), "OPENAI_API_KEY");
        assert_eq!(default_secret_name("my-llm"), "MY_LLM_API_KEY");
    }

    #[test]
    fn test_defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.default_env_var(), "API_KEY");
        assert!(config.config_dir().ends_with(".config/keyswitch"));
        assert!(config.key_path().ends_with("keyswitch.key"));
        assert!(config.secrets_path().ends_with("secrets.age"));
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/x/y"), home.join("x/y"));
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde("~other"), PathBuf::from("~other"));
    }

    #[test]
    fn test_set_and_get_default() {
        let mut config = Config::default();
        config.set_default("env_var", "LLM_KEY").unwrap();
        config.set_default("config_dir", "/tmp/ks").unwrap();
        assert_eq!(config.get_default("env_var").unwrap(), "LLM_KEY");
        assert_eq!(config.config_dir(), PathBuf::from("/tmp/ks"));

        assert!(config.set_default("env_var", "1BAD").is_err());
        assert!(config.set_default("editor", "vim").is_err());
        assert!(config.get_default("nope").is_err());
    }

    #[test]
    fn test_provider_resolution() {
        let mut config = Config::default();
        let mut openai = ProviderConfig::new("openai");
        openai.env_var = Some("OPENAI_API_KEY".into());
        config.add_provider(openai);

        let resolved = config.resolve_provider("openai");
        assert_eq!(config.env_var_for(&resolved), "OPENAI_API_KEY");
        assert_eq!(resolved.secret_name(), "OPENAI_API_KEY");

        let unknown = config.resolve_provider("groq");
        assert_eq!(unknown.secret_name(), "GROQ_API_KEY");
        assert_eq!(config.env_var_for(&unknown), "API_KEY");

        config.add_provider(ProviderConfig::new("openai"));
        assert_eq!(config.providers.len(), 1);
    }
}
