use clap::Parser;
use tracing_subscriber::EnvFilter;

use keyswitch::cli::{Cli, Commands, ConfigCommands};
use keyswitch::commands::{
    handle_config_generate, handle_config_get, handle_config_list, handle_config_providers,
    handle_config_set, handle_init, handle_key, handle_list, handle_remove, handle_rotate,
    handle_run, handle_set,
};
use keyswitch::{Config, KeyswitchError};

/// Log filter: KEYSWITCH_LOG, else debug with --verbose, else warn.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("KEYSWITCH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "keyswitch=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<i32, KeyswitchError> {
    let mut config = Config::load()?;
    if let Some(dir) = cli.config.config_dir {
        config = config.with_config_dir(dir);
    }

    match cli.command {
        Commands::Init => handle_init(&config)?,
        Commands::Key => handle_key(&config)?,
        Commands::Set { name, stdin } => handle_set(&config, &name, stdin)?,
        Commands::List { json } => handle_list(&config, json)?,
        Commands::Remove { name } => handle_remove(&config, &name)?,
        Commands::Rotate => handle_rotate(&config)?,
        Commands::Run {
            provider,
            env_var,
            command,
        } => return handle_run(&config, &provider, env_var, &command),
        Commands::Config { command } => match command {
            None | Some(ConfigCommands::List) => handle_config_list(&config)?,
            Some(ConfigCommands::Generate { path, overwrite }) => {
                handle_config_generate(path, overwrite)?
            }
            Some(ConfigCommands::Get { key }) => handle_config_get(&config, &key)?,
            Some(ConfigCommands::Set { key, value }) => handle_config_set(&key, &value)?,
            Some(ConfigCommands::Providers) => handle_config_providers(&config)?,
        },
    }
    Ok(0)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.config.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            if let Some(hint) = e.hint() {
                eprintln!("hint: {}", hint);
            }
            1
        }
    };
    std::process::exit(code);
}
