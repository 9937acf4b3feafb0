//! Command and subcommand definitions.

use clap::Subcommand;
use std::path::PathBuf;

/// Top-level commands available in keyswitch.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the config directory and key pair if missing
    Init,
    /// Print the public recipient of the current key
    Key,
    /// Store a secret (prompts for the value unless --stdin is given)
    Set {
        /// Secret name (e.g., OPENAI_API_KEY)
        name: String,

        /// Read the value from the first line of standard input
        #[arg(long)]
        stdin: bool,
    },
    /// List stored secret names (never values)
    List {
        /// Print names as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Remove a secret
    Remove {
        /// Secret name
        name: String,
    },
    /// Replace the key pair and re-encrypt the secrets under it
    Rotate,
    /// Run a program with a provider's secret in its environment
    Run {
        /// Provider id from the config (unknown ids use <ID>_API_KEY)
        provider: String,

        /// Environment variable to export the secret as
        #[arg(long, value_name = "VAR")]
        env_var: Option<String>,

        /// Program to run, followed by its arguments
        #[arg(last = true, required = true, value_name = "PROGRAM")]
        command: Vec<String>,
    },
    /// Manage configuration (shows current config if no subcommand provided)
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a config file with default values
    Generate {
        /// Path where to create the config file (default: ~/.config/keyswitch/keyswitch.kdl)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite existing config file if it exists
        #[arg(long)]
        overwrite: bool,
    },
    /// Show settings and the config file in use
    List,
    /// Get a specific configuration value
    Get {
        /// Setting key ("config_dir" or "env_var")
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },
    /// List configured providers
    Providers,
}
