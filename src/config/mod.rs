//! Configuration loading and management.

mod loader;
mod types;

pub use types::{Config, DEFAULT_CONFIG_DIR, Defaults, ProviderConfig, default_secret_name};
