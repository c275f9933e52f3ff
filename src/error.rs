//! Error types for reqlimit.

use thiserror::Error;

/// Main error type for reqlimit operations.
///
/// Only construction and configuration can fail; admission decisions never do.
#[derive(Error, Debug)]
pub enum ReqlimitError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A limit that cannot be enforced (zero requests or zero window)
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// Layered settings could not be loaded
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for reqlimit operations.
pub type Result<T> = std::result::Result<T, ReqlimitError>;
