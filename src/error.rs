//! Error types for the Deadbolt throttling core.

use thiserror::Error;

/// Main error type for Deadbolt operations.
#[derive(Error, Debug)]
pub enum DeadboltError {
    /// The caller referenced a limit type absent from the policy registry
    #[error("Unknown limit type: {0}")]
    UnknownLimitType(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Deadbolt operations.
pub type Result<T> = std::result::Result<T, DeadboltError>;
