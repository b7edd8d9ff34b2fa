//! Error types for weakscale

use thiserror::Error;

/// Main error type for configuration generation and loading
#[derive(Error, Debug)]
pub enum WeakscaleError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ensemble table violates its shape invariants
    #[error("Invalid ensemble '{label}': {reason}")]
    InvalidEnsemble { label: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for weakscale operations
pub type WeakscaleResult<T> = Result<T, WeakscaleError>;

impl From<serde_json::Error> for WeakscaleError {
    fn from(err: serde_json::Error) -> Self {
        WeakscaleError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for WeakscaleError {
    fn from(err: toml::de::Error) -> Self {
        WeakscaleError::Config(err.to_string())
    }
}
