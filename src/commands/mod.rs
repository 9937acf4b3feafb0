//! Command handlers for the keyswitch CLI.
//!
//! This module contains all the command handler functions, organized by command type.

mod config_cmd;
mod init;
mod rotate;
mod run;
mod secrets;

pub use config_cmd::{
    handle_generate as handle_config_generate, handle_get as handle_config_get,
    handle_list as handle_config_list, handle_providers as handle_config_providers,
    handle_set as handle_config_set,
};
pub use init::{handle_init, handle_key};
pub use rotate::handle_rotate;
pub use run::handle_run;
pub use secrets::{handle_list, handle_remove, handle_set};
