//! Utility functions shared across the application.

mod atomic;
pub(crate) mod permissions;
mod validate;

pub use atomic::{PendingFile, write_atomic};
pub use permissions::{OpenMode, open_private, restrict_dir_permissions};
pub use validate::{is_valid_name, validate_name};
