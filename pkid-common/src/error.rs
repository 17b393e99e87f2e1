//! Common error types for pkid

use thiserror::Error;

/// Common result type for pkid operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the pkid crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    ///
    /// Missing credentials or program identifier end up here. Fatal for a batch.
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML secrets file could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
