use thiserror::Error;

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the reconciliation engine
#[derive(Error, Debug)]
pub enum Error {
    /// Missing/empty mention, unknown property, malformed property value, limit out of
    /// range. Surfaced per sub-query; other sub-queries in a batch proceed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Entity type not registered in the strategy registry.
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// `preview`/`get_by_id` for an unknown id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Id is neither a valid canonical URI nor a parseable integer.
    #[error("Malformed id: {0}")]
    MalformedId(String),

    /// Resource exhaustion (connection pool, request queue). Retryable by the caller.
    #[error("Overloaded: {0}")]
    Overloaded(String),

    /// Invariant violation (e.g. a channel label disagreement between the two search
    /// channels for the same id). Logged with context; the offending row is dropped
    /// and the batch continues.
    #[error("Internal invariant violation: {0}")]
    Internal(String),

    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors. Programming errors of this kind abort process startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection pool, query execution).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding provider errors. Recoverable: the semantic channel degrades to
    /// unavailable and retrieval falls back to trigram-only (spec §4.2, §7).
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// LLM rerank errors. Always recoverable: callers fall back to blend ordering.
    #[error("LLM rerank error: {0}")]
    LlmRerank(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        Self::UnknownEntityType(name.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn malformed_id(msg: impl Into<String>) -> Self {
        Self::MalformedId(msg.into())
    }

    pub fn overloaded(msg: impl Into<String>) -> Self {
        Self::Overloaded(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn llm_rerank(msg: impl Into<String>) -> Self {
        Self::LlmRerank(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// True for channel-local failures the hybrid blender absorbs with a zero score
    /// instead of failing the whole sub-query (spec §7 propagation policy).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::LlmRerank(_))
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}
