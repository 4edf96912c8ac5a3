use crate::error::{EmbeddingError, Result};
use async_trait::async_trait;

/// Maps text to fixed-length vectors.
///
/// Every vector produced by one provider has length [`EmbeddingProvider::dimension`].
/// Providers are called in batch when a corpus is built and once per query
/// at retrieval time.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this provider produces.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed(vec![text.to_string()]).await?;
        match embeddings.pop() {
            Some(embedding) if embeddings.is_empty() => Ok(embedding),
            Some(_) => Err(EmbeddingError::EmbeddingGeneration(
                "provider returned more than one embedding for a single text".into(),
            )),
            None => Err(EmbeddingError::EmbeddingGeneration(
                "No embedding generated".into(),
            )),
        }
    }
}
