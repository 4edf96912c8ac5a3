use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;
use crate::{COMPACT_EMBEDDING_DIM, DEFAULT_EMBEDDING_DIM};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for the embedding service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    pub model: EmbeddingModelType,

    /// Target embedding dimension (for Matryoshka truncation)
    pub dimension: usize,

    /// Maximum batch size for embedding generation
    pub batch_size: usize,

    /// Show download progress when downloading models
    pub show_download_progress: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: EmbeddingModelType::NomicEmbedTextV15,
            dimension: DEFAULT_EMBEDDING_DIM,
            batch_size: 32,
            show_download_progress: false,
        }
    }
}

impl EmbeddingConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(EmbeddingError::InvalidInput(
                "dimension must be > 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EmbeddingError::InvalidInput(
                "batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Supported embedding models
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum EmbeddingModelType {
    /// Nomic-embed-text-v1.5 (768 dims, Matryoshka-truncatable)
    NomicEmbedTextV15,
    /// All-MiniLM-L6-v2 (384 dims, lightweight)
    AllMiniLmL6V2,
    /// BGE-small-en-v1.5 (384 dims)
    BgeSmallEnV15,
}

impl EmbeddingModelType {
    fn to_fastembed_model(self) -> EmbeddingModel {
        match self {
            EmbeddingModelType::NomicEmbedTextV15 => EmbeddingModel::NomicEmbedTextV15,
            EmbeddingModelType::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            EmbeddingModelType::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
        }
    }
}

/// Local text embedding service backed by fastembed (ONNX Runtime)
pub struct EmbeddingService {
    model: Arc<TextEmbedding>,
    config: EmbeddingConfig,
}

impl EmbeddingService {
    /// Create a new embedding service with default configuration
    pub async fn new() -> Result<Self> {
        Self::with_config(EmbeddingConfig::default()).await
    }

    /// Create a new embedding service with custom configuration
    pub async fn with_config(config: EmbeddingConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing embedding service with model {:?}, dimension {}",
            config.model, config.dimension
        );

        let init_options = InitOptions::new(config.model.to_fastembed_model())
            .with_show_download_progress(config.show_download_progress);

        let model = TextEmbedding::try_new(init_options).map_err(|e| {
            EmbeddingError::ModelInitialization(format!("Failed to initialize model: {e}"))
        })?;

        info!("Embedding service initialized successfully");

        Ok(Self {
            model: Arc::new(model),
            config,
        })
    }

    /// Create a compact embedding service (256 dimensions)
    pub async fn new_compact() -> Result<Self> {
        let config = EmbeddingConfig {
            dimension: COMPACT_EMBEDDING_DIM,
            ..Default::default()
        };
        Self::with_config(config).await
    }

    /// Generate embeddings for a list of texts, in batches of `batch_size`.
    ///
    /// Blocks on ONNX inference. Async callers go through
    /// [`EmbeddingProvider::embed`], which moves the work to the blocking pool.
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embed_chunks(&self.model, &self.config, texts)
    }

    /// Get the configuration of this service
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingService {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || embed_chunks(&model, &config, &texts))
            .await
            .map_err(|e| EmbeddingError::EmbeddingGeneration(format!("embedding task failed: {e}")))?
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

fn embed_chunks(
    model: &TextEmbedding,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    debug!("Generating embeddings for {} texts", texts.len());

    let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in text_refs.chunks(config.batch_size) {
        let batch_embeddings = model
            .embed(chunk.to_vec(), None)
            .map_err(|e| EmbeddingError::EmbeddingGeneration(e.to_string()))?;

        for embedding in batch_embeddings {
            all_embeddings.push(fit_dimension(embedding, config.dimension)?);
        }
    }

    debug!("Generated {} embeddings", all_embeddings.len());

    Ok(all_embeddings)
}

/// Truncate to `dimension`; shorter vectors are rejected so that a corpus
/// never mixes lengths.
fn fit_dimension(mut embedding: Vec<f32>, dimension: usize) -> Result<Vec<f32>> {
    if embedding.len() < dimension {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimension,
            actual: embedding.len(),
        });
    }
    embedding.truncate(dimension);
    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_validation() {
        assert!(EmbeddingConfig::default().validate().is_ok());

        let config = EmbeddingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EmbeddingConfig {
            dimension: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fit_dimension_truncates_and_rejects_short() {
        assert_eq!(fit_dimension(vec![0.1, 0.2, 0.3], 2).unwrap(), vec![0.1, 0.2]);
        assert!(matches!(
            fit_dimension(vec![0.1], 2),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    #[ignore] // Requires embedding model download
    async fn test_embed_keeps_runtime_responsive() {
        let service = EmbeddingService::new().await.unwrap();
        let texts: Vec<String> = (0..256).map(|i| format!("passage number {i}")).collect();

        let ticker = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        });
        let embeddings = service.embed(texts).await.unwrap();
        assert_eq!(embeddings.len(), 256);
        ticker.await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires embedding model download
    async fn test_default_dimension() {
        let service = EmbeddingService::new().await.unwrap();
        assert_eq!(service.dimension(), DEFAULT_EMBEDDING_DIM);
    }

    #[tokio::test]
    #[ignore] // Requires embedding model download
    async fn test_compact_truncation() {
        let service = EmbeddingService::new_compact().await.unwrap();
        let embedding = service.embed_single("retrieval pipeline").await.unwrap();
        assert_eq!(embedding.len(), COMPACT_EMBEDDING_DIM);
    }

    #[tokio::test]
    #[ignore] // Requires embedding model download
    async fn test_batch_preserves_order_and_count() {
        let service = EmbeddingService::new().await.unwrap();
        let texts: Vec<String> = (0..70).map(|i| format!("passage number {i}")).collect();

        let embeddings = service.embed(texts.clone()).await.unwrap();
        assert_eq!(embeddings.len(), texts.len());
    }

    #[tokio::test]
    #[ignore] // Requires embedding model download
    async fn test_empty_input() {
        let service = EmbeddingService::new().await.unwrap();
        let embeddings = service.embed(Vec::new()).await.unwrap();
        assert!(embeddings.is_empty());
    }
}
