//! Error types for Ratekeeper.

use thiserror::Error;

/// Main error type for Ratekeeper operations.
///
/// Admission decisions themselves never fail; errors only surface while
/// building limiters or loading their configuration.
#[derive(Error, Debug)]
pub enum RatekeeperError {
    /// A limiter was given a zero threshold, zero leak rate or sub-millisecond interval
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No limiter is registered for the named resource
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Ratekeeper operations.
pub type Result<T> = std::result::Result<T, RatekeeperError>;
