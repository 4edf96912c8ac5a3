use thiserror::Error;

/// Errors that can occur during embedding or cross-encoder inference
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Failed to initialize the model
    #[error("Failed to initialize model: {0}")]
    ModelInitialization(String),

    /// Failed to generate embeddings
    #[error("Failed to generate embeddings: {0}")]
    EmbeddingGeneration(String),

    /// Failed to score query-document pairs
    #[error("Failed to score pairs: {0}")]
    Scoring(String),

    /// Invalid input provided to the service
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A produced vector does not have the configured length
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;
