use thiserror::Error;

/// Errors surfaced to the caller of a retrieval.
///
/// Every variant except `Cancelled`, `Embedding` and `Task` is a configuration
/// error: it is raised before any scoring work begins. Per-document scoring
/// and judging failures never appear here; they are recorded as
/// [`Degradation`](crate::Degradation) notes on the result instead.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Invalid weight for {name}: {value}")]
    InvalidWeight { name: String, value: f32 },

    #[error("Invalid {name}: must be > 0, got {value}")]
    InvalidK { name: &'static str, value: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding dimension mismatch: corpus uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate document id in corpus: {0}")]
    DuplicateDocumentId(String),

    #[error("Query has no embedding and no embedding provider is configured")]
    MissingQueryEmbedding,

    #[error("Scorer '{0}' produced no score for any document")]
    ScorerWithoutScores(String),

    #[error("Retrieval cancelled before {stage}")]
    Cancelled { stage: &'static str },

    #[error("Embedding error: {0}")]
    Embedding(#[from] ragfuse_embeddings::EmbeddingError),

    #[error("Scoring task failed: {0}")]
    Task(String),
}

impl RetrievalError {
    /// True for errors caused by invalid input or configuration.
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            RetrievalError::Cancelled { .. }
                | RetrievalError::Embedding(_)
                | RetrievalError::Task(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
