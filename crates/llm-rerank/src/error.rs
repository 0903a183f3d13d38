//! Error types for the LLM rerank module.

use std::fmt;

#[derive(Debug)]
pub enum LlmRerankError {
    /// The completion call itself failed or timed out.
    InferenceError(String),

    /// The model's response was not valid JSON, or didn't match the
    /// expected schema.
    MalformedResponse(String),

    /// The model proposed an id that wasn't in the candidate set, dropped
    /// an id it was given, or duplicated one (spec §4.8 invariant).
    InvalidRanking(String),

    ConfigError(String),
}

impl fmt::Display for LlmRerankError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InferenceError(msg) => write!(f, "LLM rerank request failed: {msg}"),
            Self::MalformedResponse(msg) => write!(f, "Malformed LLM rerank response: {msg}"),
            Self::InvalidRanking(msg) => write!(f, "Invalid LLM rerank ranking: {msg}"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for LlmRerankError {}

impl From<LlmRerankError> for reconcile_core::error::Error {
    fn from(err: LlmRerankError) -> Self {
        reconcile_core::error::Error::LlmRerank(err.to_string())
    }
}
