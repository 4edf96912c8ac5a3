use crate::error::{Result, RetrievalError};
use log::debug;
use ragfuse_embeddings::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Stable identifier of a document, unique within a corpus
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for DocumentId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<usize> for DocumentId {
    fn from(id: usize) -> Self {
        Self(id.to_string())
    }
}

/// Scalar metadata value (source page, file name, row number, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Immutable unit of retrievable content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub type EmbeddingVector = Vec<f32>;

/// Ordered, read-only collection of documents and their embeddings.
///
/// Position `i` in the corpus is the document's insertion index and is the
/// final tie-breaker for every ranking. All embeddings share one length.
#[derive(Debug)]
pub struct Corpus {
    documents: Vec<Arc<Document>>,
    embeddings: Vec<EmbeddingVector>,
    dimension: usize,
    fingerprint: u64,
}

impl Corpus {
    /// Build a corpus from documents and their precomputed embeddings.
    ///
    /// `embeddings[i]` belongs to `documents[i]`.
    pub fn new(documents: Vec<Document>, embeddings: Vec<EmbeddingVector>) -> Result<Self> {
        if documents.len() != embeddings.len() {
            return Err(RetrievalError::InvalidConfig(format!(
                "corpus has {} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }

        let mut seen = HashSet::with_capacity(documents.len());
        for doc in &documents {
            if !seen.insert(&doc.id) {
                return Err(RetrievalError::DuplicateDocumentId(doc.id.to_string()));
            }
        }

        let dimension = embeddings.first().map_or(0, Vec::len);
        for embedding in &embeddings {
            if embedding.len() != dimension {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
        }

        let fingerprint = Self::compute_fingerprint(&documents);

        Ok(Self {
            documents: documents.into_iter().map(Arc::new).collect(),
            embeddings,
            dimension,
            fingerprint,
        })
    }

    /// Build a corpus by embedding every document text with `provider`.
    pub async fn embed(
        documents: Vec<Document>,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        debug!("Embedding corpus of {} documents", documents.len());
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = provider.embed(texts).await?;
        Self::new(documents, embeddings)
    }

    fn compute_fingerprint(documents: &[Document]) -> u64 {
        let mut hasher = DefaultHasher::new();
        documents.len().hash(&mut hasher);
        for doc in documents {
            doc.id.hash(&mut hasher);
            doc.text.hash(&mut hasher);
        }
        hasher.finish()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Embedding length shared by every document (0 for an empty corpus)
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Hash of document ids and texts, stable for the lifetime of the process
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn document(&self, index: usize) -> Option<&Arc<Document>> {
        self.documents.get(index)
    }

    pub fn embeddings(&self) -> &[EmbeddingVector] {
        &self.embeddings
    }

    /// Document ids in insertion order
    pub fn ids(&self) -> Vec<DocumentId> {
        self.documents.iter().map(|d| d.id.clone()).collect()
    }
}

/// Per-call overrides of the retrieval configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    pub initial_k: Option<usize>,
    pub final_k: Option<usize>,
    pub fusion_weight: Option<f32>,
}

/// A single retrieval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub embedding: Option<EmbeddingVector>,
    #[serde(default)]
    pub params: QueryParams,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            embedding: None,
            params: QueryParams::default(),
        }
    }

    pub fn with_embedding(mut self, embedding: EmbeddingVector) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_initial_k(mut self, initial_k: usize) -> Self {
        self.params.initial_k = Some(initial_k);
        self
    }

    pub fn with_final_k(mut self, final_k: usize) -> Self {
        self.params.final_k = Some(final_k);
        self
    }

    pub fn with_fusion_weight(mut self, alpha: f32) -> Self {
        self.params.fusion_weight = Some(alpha);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("a", "alpha").with_metadata("page", 1_i64),
            Document::new("b", "beta"),
        ]
    }

    #[test]
    fn test_corpus_preserves_order() {
        let corpus = Corpus::new(docs(), vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.dimension(), 2);
        assert_eq!(corpus.ids(), vec![DocumentId::from("a"), DocumentId::from("b")]);
        assert_eq!(
            corpus.document(0).unwrap().metadata.get("page"),
            Some(&MetadataValue::Integer(1))
        );
    }

    #[test]
    fn test_corpus_rejects_mixed_dimensions() {
        let result = Corpus::new(docs(), vec![vec![1.0, 0.0], vec![1.0]]);
        assert!(matches!(
            result,
            Err(RetrievalError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_corpus_rejects_duplicate_ids() {
        let documents = vec![Document::new("a", "one"), Document::new("a", "two")];
        let result = Corpus::new(documents, vec![vec![1.0], vec![2.0]]);
        assert!(matches!(result, Err(RetrievalError::DuplicateDocumentId(id)) if id == "a"));
    }

    #[test]
    fn test_corpus_rejects_missing_embeddings() {
        let result = Corpus::new(docs(), vec![vec![1.0]]);
        assert!(matches!(result, Err(RetrievalError::InvalidConfig(_))));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Corpus::new(docs(), vec![vec![1.0], vec![2.0]]).unwrap();
        let b = Corpus::new(docs(), vec![vec![3.0], vec![4.0]]).unwrap();
        let c = Corpus::new(
            vec![Document::new("a", "alpha"), Document::new("b", "gamma")],
            vec![vec![1.0], vec![2.0]],
        )
        .unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = Corpus::new(Vec::new(), Vec::new()).unwrap();
        assert!(corpus.is_empty());
        assert_eq!(corpus.dimension(), 0);
    }

    struct CharCountProvider;

    #[async_trait]
    impl EmbeddingProvider for CharCountProvider {
        async fn embed(
            &self,
            texts: Vec<String>,
        ) -> ragfuse_embeddings::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_corpus_embed_uses_provider() {
        let corpus = Corpus::embed(docs(), &CharCountProvider).await.unwrap();
        assert_eq!(corpus.embeddings(), &[vec![5.0], vec![4.0]]);
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new("what is bm25")
            .with_embedding(vec![0.5])
            .with_final_k(3)
            .with_fusion_weight(0.2);
        assert_eq!(query.params.final_k, Some(3));
        assert_eq!(query.params.fusion_weight, Some(0.2));
        assert_eq!(query.params.initial_k, None);
    }
}
