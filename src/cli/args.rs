//! CLI argument parsing structures.

use clap::{Args, Parser};
use std::path::PathBuf;

use super::commands::Commands;

/// Main CLI structure for keyswitch.
#[derive(Parser, Debug)]
#[command(name = "keyswitch", version)]
#[command(about = "Encrypted API keys, handed to programs one at a time", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global configuration arguments available to all commands.
#[derive(Debug, Default, Args)]
pub struct ConfigArgs {
    /// Directory holding keyswitch.key and secrets.age
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Log debug output to stderr (overridden by KEYSWITCH_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}
