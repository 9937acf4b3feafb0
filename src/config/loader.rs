//! Configuration file loading and saving.

use std::path::{Path, PathBuf};

use super::types::{Config, DEFAULT_CONFIG_DIR};
use crate::error::{KeyswitchError, Result};

const CONFIG_FILE_NAME: &str = "keyswitch.kdl";

impl Config {
    /// Get the explicit ~/.config/keyswitch/keyswitch.kdl path (XDG-style, cross-platform)
    fn xdg_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config/keyswitch").join(CONFIG_FILE_NAME))
    }

    /// Platform-native config path, unless it is the XDG path already.
    fn native_config_path() -> Option<PathBuf> {
        let native = dirs::config_dir()?.join("keyswitch").join(CONFIG_FILE_NAME);
        if Self::xdg_config_path().as_ref() == Some(&native) {
            None
        } else {
            Some(native)
        }
    }

    /// Get the list of config file search paths in priority order
    fn get_config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        paths.extend(Self::xdg_config_path());
        paths.extend(Self::native_config_path());
        paths
    }

    /// Config locations with descriptions, recommended first.
    pub fn get_config_location_options() -> Vec<(PathBuf, &'static str)> {
        let mut options = Vec::new();

        if let Some(xdg_path) = Self::xdg_config_path() {
            options.push((xdg_path, "~/.config/keyswitch/ (Recommended)"));
        }
        if let Some(native_path) = Self::native_config_path() {
            options.push((native_path, "Platform config directory"));
        }
        options.push((PathBuf::from(CONFIG_FILE_NAME), "Current directory"));

        options
    }

    /// Find existing config file by searching all standard locations
    /// Returns the path to the first existing config file found, or None
    pub fn find_existing_config() -> Option<PathBuf> {
        Self::get_config_search_paths()
            .into_iter()
            .find(|path| path.exists())
    }

    /// Get the default config path (~/.config/keyswitch/keyswitch.kdl)
    pub fn default_config_path() -> PathBuf {
        Self::xdg_config_path().unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Parse KDL source.
    pub fn parse(file_name: &str, content: &str) -> Result<Self> {
        knuffel::parse::<Config>(file_name, content).map_err(|e| {
            KeyswitchError::config(format!("invalid configuration in {}: {}", file_name, e))
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KeyswitchError::read_failed("config file", path, e))?;
        let config = Self::parse(&path.to_string_lossy(), &content)?;
        tracing::debug!(path = %path.display(), providers = config.providers.len(), "loaded config");
        Ok(config)
    }

    /// Load configuration from keyswitch.kdl, searching multiple locations.
    /// Falls back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        match Self::find_existing_config() {
            Some(path) => Self::load_from_path(&path),
            None => {
                tracing::debug!("no config file found, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// Generate a config file with default values
    pub fn generate_config_file(path: Option<PathBuf>, overwrite: bool) -> Result<PathBuf> {
        let config_path = path.unwrap_or_else(Self::default_config_path);

        if config_path.exists() && !overwrite {
            return Err(KeyswitchError::config(format!(
                "config file already exists at: {}",
                config_path.display()
            ))
            .with_hint("use --overwrite to replace it"));
        }

        if let Some(parent) = config_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| KeyswitchError::storage("failed to create directory", parent, e))?;
        }

        let kdl_content = format!(
            r#"// Global defaults
// config_dir holds keyswitch.key and secrets.age
// env_var is the variable a secret is exported as when a provider names none
defaults config_dir="{}" env_var="API_KEY"

// A provider's secret defaults to <ID>_API_KEY in the secrets file
// provider "openai" {{
//     secret "OPENAI_API_KEY"
//     env-var "OPENAI_API_KEY"
// }}

// Non-secret settings are passed to the child process as-is
// provider "local-llm" {{
//     env-var "OPENAI_API_KEY"
//     base-url "http://localhost:8080/v1"
//     base-url-env "OPENAI_BASE_URL"
// }}
"#,
            DEFAULT_CONFIG_DIR
        );

        std::fs::write(&config_path, kdl_content)
            .map_err(|e| KeyswitchError::storage("failed to write", &config_path, e))?;
        Ok(config_path)
    }

    /// Serialize config to KDL format
    pub fn to_kdl(&self) -> String {
        let mut output = String::new();

        output.push_str("// keyswitch configuration file\n\n");

        output.push_str("defaults");
        if let Some(d) = &self.defaults {
            if let Some(config_dir) = &d.config_dir {
                output.push_str(&format!(" config_dir={}", kdl_string(config_dir)));
            }
            if let Some(env_var) = &d.env_var {
                output.push_str(&format!(" env_var={}", kdl_string(env_var)));
            }
        }
        output.push('\n');

        for provider in &self.providers {
            output.push_str(&format!("\nprovider {} {{\n", kdl_string(&provider.id)));

            let children = [
                ("secret", &provider.secret),
                ("env-var", &provider.env_var),
                ("base-url", &provider.base_url),
                ("base-url-env", &provider.base_url_env),
            ];
            for (name, value) in children {
                if let Some(value) = value {
                    output.push_str(&format!("    {} {}\n", name, kdl_string(value)));
                }
            }

            output.push_str("}\n");
        }

        output
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_kdl())
            .map_err(|e| KeyswitchError::storage("failed to write", path, e))
    }
}

/// KDL string literal with `"` and `\` escaped.
fn kdl_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
