//! # RagFuse Embeddings
//!
//! Model-backed collaborators for the retrieval core:
//!
//! - [`EmbeddingProvider`]: text → fixed-length vector. [`EmbeddingService`]
//!   implements it locally with fastembed-rs (ONNX Runtime), defaulting to
//!   Nomic-embed-text-v1.5 with optional Matryoshka truncation.
//! - [`RerankService`]: a local cross-encoder that scores query-document
//!   pairs jointly, used by the retrieval crate's cross-encoder judge.
//!
//! ## Example
//!
//! ```no_run
//! use ragfuse_embeddings::{EmbeddingProvider, EmbeddingService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = EmbeddingService::new().await?;
//!     let texts = vec!["BM25 weighs rare terms more heavily.".to_string()];
//!     let embeddings = service.embed(texts).await?;
//!     println!("Generated {} embeddings", embeddings.len());
//!     Ok(())
//! }
//! ```

mod error;
mod provider;
mod rerank_model;
mod service;

pub use error::{EmbeddingError, Result};
pub use provider::EmbeddingProvider;
pub use rerank_model::{RerankModelConfig, RerankModelType, RerankService};
pub use service::{EmbeddingConfig, EmbeddingModelType, EmbeddingService};

/// Default embedding dimension for Nomic-embed-text-v1.5
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Compact embedding dimension (using Matryoshka truncation)
pub const COMPACT_EMBEDDING_DIM: usize = 256;
