/*!
# RagFuse Retrieval

Fusion-and-rerank retrieval core combining:
- **Lexical search** via Okapi BM25 over a pluggable tokenizer
- **Vector search** over precomputed embeddings (cosine, L2 or dot product)
- **Min-max normalization** onto a common [0, 1] scale
- **Weighted fusion** with a deterministic, stable tie-break
- **Judge reranking** via a cross-encoder or an LLM rating

## Architecture

```text
Query
  ├─> Lexical Scorer (BM25, every document)
  ├─> Vector Scorer (every document)
  │     └─> joined
  └─> Normalizer
        └─> Fusion (α·vector + (1-α)·lexical)
              └─> Reranking (optional, top initial_k)
                    └─> Final top final_k
```

## Example

```rust,no_run
use ragfuse_retrieval::{Corpus, Document, HybridRetrieval, Query, RetrievalConfig};
use std::sync::Arc;

# async fn run() -> ragfuse_retrieval::Result<()> {
let corpus = Arc::new(Corpus::new(
    vec![
        Document::new("a", "BM25 ranks documents by term overlap"),
        Document::new("b", "Embeddings capture meaning"),
    ],
    vec![vec![1.0, 0.0], vec![0.0, 1.0]],
)?);

let retrieval = HybridRetrieval::new(RetrievalConfig::fast())?;
let query = Query::new("term overlap").with_embedding(vec![0.9, 0.1]);
let results = retrieval.retrieve(&query, &corpus).await?;

for result in results.top(5) {
    println!("{}. {} (score: {:.2})", result.rank + 1, result.document.id, result.score);
}
# Ok(())
# }
```

## Failure model

Configuration problems (weights, `k` values, dimensions, missing
collaborators) fail the call before any scoring. Per-document problems
(missing scores, unparseable or slow judges) never fail the call; each is
recorded as a [`Degradation`] on the returned [`SearchResults`].
*/

mod config;
mod document;
mod error;
pub mod eval;
mod fusion;
mod judge;
mod lexical;
mod normalize;
mod rerank;
mod result;
mod retrieval;
mod rewrite;
mod tokenizer;
mod vector;

pub use config::{Bm25Config, FusionStrategy, RerankConfig, RetrievalConfig, TokenizerConfig};
pub use document::{
    Corpus, Document, DocumentId, EmbeddingVector, Metadata, MetadataValue, Query, QueryParams,
};
pub use error::{Result, RetrievalError};
pub use fusion::{FusionEngine, FusionOutput, ScoreSets, TIE_TOLERANCE, fuse_scores};
pub use judge::{
    CrossEncoderJudge, CrossEncoderModel, DEFAULT_JUDGE_PROMPT, JudgeError, LlmJudge,
    RelevanceJudge,
};
pub use lexical::{Bm25Index, Bm25Scorer};
pub use normalize::{DEFAULT_EPSILON, ScoreDirection, normalize};
pub use rerank::{RerankEngine, RerankOutput, rerank};
pub use result::{
    Degradation, FusedCandidate, RerankedCandidate, ScoredCandidate, SearchResult,
    SearchResults, SearchSource, SearchStats,
};
pub use retrieval::{CacheStats, HybridRetrieval, LEXICAL_SCORER, VECTOR_SCORER};
pub use rewrite::{DEFAULT_REWRITE_PROMPT, QueryRewriter, QueryTransform, RewrittenQuery};
pub use tokenizer::{SimpleTokenizer, Tokenizer, WhitespaceTokenizer};
pub use vector::{VectorMetric, VectorScorer};
