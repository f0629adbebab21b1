//! Error types for the simulator contract

use thiserror::Error;

/// Core error type for simulator operations
#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid or contradictory configuration, detected before a run starts
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid action
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// `step` was called on an episode that already terminated or truncated
    #[error("Episode already finished; call reset() first")]
    EpisodeFinished,

    /// `step` was called before the first `reset`
    #[error("Environment has not been reset")]
    NotReset,

    /// Requested preset is not registered
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML decoding error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SimError {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;
