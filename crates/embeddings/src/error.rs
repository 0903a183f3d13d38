//! Error types for the embeddings module

use std::fmt;

/// Errors that can occur during embedding operations
#[derive(Debug)]
pub enum EmbeddingError {
    /// Provider initialization failed (bad config, client construction).
    ModelLoadError(String),

    /// The request/inference call itself failed, after exhausting retries.
    InferenceError(String),

    /// Dimension of a returned vector didn't match the configured dimension.
    DimensionMismatch { expected: usize, got: usize },

    /// Configuration error
    ConfigError(String),

    /// Other error
    Other(String),
}

impl fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelLoadError(msg) => write!(f, "Failed to initialize embedding provider: {msg}"),
            Self::InferenceError(msg) => write!(f, "Embedding request failed: {msg}"),
            Self::DimensionMismatch { expected, got } => {
                write!(f, "Dimension mismatch: expected {expected}, got {got}")
            }
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            Self::Other(msg) => write!(f, "Embedding error: {msg}"),
        }
    }
}

impl std::error::Error for EmbeddingError {}

impl From<EmbeddingError> for reconcile_core::error::Error {
    fn from(err: EmbeddingError) -> Self {
        reconcile_core::error::Error::Embedding(err.to_string())
    }
}
