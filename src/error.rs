//! Error types and handling for the `TunnelWatch` service

use thiserror::Error;

/// Main error type for the `TunnelWatch` service
#[derive(Error, Debug)]
pub enum TunnelWatchError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// A referenced entity does not exist
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Report or tunnel storage errors
    #[error("Storage error: {message}")]
    Store { message: String },
}

impl TunnelWatchError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TunnelWatchError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            TunnelWatchError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            TunnelWatchError::NotFound { message } => message.clone(),
            TunnelWatchError::Store { .. } => {
                "Traffic data is temporarily unavailable. Please try again later.".to_string()
            }
        }
    }
}

// Storage adapters work in `anyhow` internally and surface as store errors.
impl From<anyhow::Error> for TunnelWatchError {
    fn from(err: anyhow::Error) -> Self {
        TunnelWatchError::Store {
            message: format!("{err:#}"),
        }
    }
}
