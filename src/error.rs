//! Error types for keyrotor
//!
//! Rotation queries never fail; they return `None` when nothing is available.
//! Errors only come from loading configuration and parsing names.

use thiserror::Error;

/// Main error type for keyrotor
#[derive(Debug, Error)]
pub enum RotationError {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Role name is not one of the recognized router roles
    #[error(
        "Unknown role '{0}'. Expected one of: default, longContext, background, think, webSearch"
    )]
    UnknownRole(String),

    /// Model target is not in `provider,model` form
    #[error("Invalid model target '{0}'. Expected 'provider,model'")]
    InvalidTarget(String),
}

impl From<serde_json::Error> for RotationError {
    fn from(err: serde_json::Error) -> Self {
        RotationError::Config(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for RotationError {
    fn from(err: std::io::Error) -> Self {
        RotationError::Config(format!("IO error: {}", err))
    }
}

/// Result type alias for keyrotor operations
pub type Result<T> = std::result::Result<T, RotationError>;
