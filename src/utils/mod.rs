//! Utility functions and helpers.
//!
//! - Path manipulation (tilde expansion, absolute paths, file base names)
//! - Timestamp formatting for artifact names and audit lines
//! - User information retrieval
//!
//! # Submodules
//!
//! - [`formatters`]: Timestamp and console formatting
//! - [`paths`]: Path manipulation
//!
//! # Examples
//!
//! ```
//! use vigil::utils::{file_base_name, format_relative_time};
//! use std::path::Path;
//!
//! assert_eq!(file_base_name(Path::new("/home/me/notes.txt")), "notes.txt");
//! let age = format_relative_time(0);
//! assert!(age.ends_with("ago"));
//! ```

/// Timestamp and console formatting
pub mod formatters;
/// Path manipulation and resolution utilities
pub mod paths;

pub use formatters::{format_relative_time, format_stamp};
pub use paths::{expand_tilde, file_base_name};

/// Retrieves the current system username, falling back to "unknown" if not found.
#[must_use]
pub fn get_current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
