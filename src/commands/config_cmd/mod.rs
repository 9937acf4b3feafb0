//! Config command handlers - managing configuration.

mod handlers;

pub use handlers::{handle_generate, handle_get, handle_list, handle_providers, handle_set};
