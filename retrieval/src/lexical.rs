//! Okapi BM25 lexical scoring.
//!
//! A [`Bm25Index`] holds the per-corpus statistics (term frequencies,
//! document lengths, document frequencies). Scoring a query produces one
//! score per document in corpus order; documents sharing no term with the
//! query score 0.

use crate::config::Bm25Config;
use crate::document::Corpus;
use crate::result::ScoredCandidate;
use crate::tokenizer::Tokenizer;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Term statistics for one corpus
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lengths: Vec<u32>,
    doc_freqs: HashMap<String, u32>,
    avg_doc_length: f32,
}

impl Bm25Index {
    pub fn build(corpus: &Corpus, tokenizer: &dyn Tokenizer) -> Self {
        let mut term_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lengths = Vec::with_capacity(corpus.len());
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();

        for doc in corpus.documents() {
            let tokens = tokenizer.tokenize(&doc.text);
            doc_lengths.push(tokens.len() as u32);

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(tf);
        }

        let total: u64 = doc_lengths.iter().map(|&l| u64::from(l)).sum();
        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            total as f32 / doc_lengths.len() as f32
        };

        debug!(
            "Built BM25 index: {} documents, {} distinct terms, avgdl {:.2}",
            doc_lengths.len(),
            doc_freqs.len(),
            avg_doc_length
        );

        Self {
            term_freqs,
            doc_lengths,
            doc_freqs,
            avg_doc_length,
        }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    /// IDF: ln((N - df + 0.5) / (df + 0.5) + 1), always positive
    pub fn idf(&self, term: &str) -> f32 {
        let n = self.doc_count() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Score every document for `query_tokens`, in corpus order.
    ///
    /// Repeated query terms contribute once per occurrence.
    pub fn score(&self, query_tokens: &[String], params: Bm25Config) -> Vec<f32> {
        let mut scores = vec![0.0_f32; self.doc_count()];
        if query_tokens.is_empty() || scores.is_empty() {
            return scores;
        }

        // All-empty documents give avgdl 0; any positive value leaves tf_norm at 0.
        let avgdl = if self.avg_doc_length > 0.0 {
            self.avg_doc_length
        } else {
            1.0
        };
        let (k1, b) = (params.k1, params.b);

        for term in query_tokens {
            if !self.doc_freqs.contains_key(term) {
                continue;
            }
            let idf = self.idf(term);

            for (doc_idx, tf_map) in self.term_freqs.iter().enumerate() {
                let Some(&tf) = tf_map.get(term) else {
                    continue;
                };
                let tf = tf as f32;
                let dl = self.doc_lengths[doc_idx] as f32;
                let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
                scores[doc_idx] += idf * tf_norm;
            }
        }

        scores
    }
}

/// BM25 scorer with a pluggable tokenizer
#[derive(Clone)]
pub struct Bm25Scorer {
    params: Bm25Config,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Bm25Scorer {
    pub fn new(params: Bm25Config, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { params, tokenizer }
    }

    pub fn params(&self) -> Bm25Config {
        self.params
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenizer.tokenize(text)
    }

    pub fn build_index(&self, corpus: &Corpus) -> Bm25Index {
        Bm25Index::build(corpus, self.tokenizer.as_ref())
    }

    /// Score `query_tokens` against every document of `corpus`.
    ///
    /// An empty corpus yields an empty result.
    pub fn score(&self, query_tokens: &[String], corpus: &Corpus) -> Vec<ScoredCandidate> {
        let index = self.build_index(corpus);
        self.score_with_index(query_tokens, corpus, &index)
    }

    /// Score against a prebuilt index of the same corpus.
    pub fn score_with_index(
        &self,
        query_tokens: &[String],
        corpus: &Corpus,
        index: &Bm25Index,
    ) -> Vec<ScoredCandidate> {
        index
            .score(query_tokens, self.params)
            .into_iter()
            .zip(corpus.documents())
            .enumerate()
            .map(|(idx, (score, doc))| ScoredCandidate::new(doc.id.clone(), idx, score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::tokenizer::SimpleTokenizer;
    use pretty_assertions::assert_eq;

    fn corpus(texts: &[&str]) -> Corpus {
        let docs: Vec<Document> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Document::new(i, *t))
            .collect();
        let embeddings = vec![vec![0.0]; docs.len()];
        Corpus::new(docs, embeddings).unwrap()
    }

    fn scorer() -> Bm25Scorer {
        Bm25Scorer::new(Bm25Config::default(), Arc::new(SimpleTokenizer::default()))
    }

    fn query(scorer: &Bm25Scorer, text: &str) -> Vec<String> {
        scorer.tokenize(text)
    }

    #[test]
    fn test_scores_every_document() {
        let corpus = corpus(&[
            "rust programming systems language",
            "python programming scripting",
            "gardening tips for spring",
        ]);
        let scorer = scorer();
        let results = scorer.score(&query(&scorer, "rust programming"), &corpus);

        assert_eq!(results.len(), 3);
        assert!(results[0].score > results[1].score);
        assert!(results[1].score > 0.0);
        assert_eq!(results[2].score, 0.0);
        assert_eq!(results[2].id, crate::DocumentId::from(2_usize));
    }

    #[test]
    fn test_term_frequency_saturates() {
        let corpus = corpus(&["rust", "rust rust", "rust rust rust rust rust rust rust rust"]);
        let index = Bm25Index::build(&corpus, &SimpleTokenizer::default());
        let params = Bm25Config { k1: 1.2, b: 0.0 };
        let scores = index.score(&["rust".to_string()], params);

        let first_gain = scores[1] - scores[0];
        let later_gain = (scores[2] - scores[1]) / 6.0;
        assert!(first_gain > later_gain, "tf contribution must be sub-linear");
        assert!(scores[2] < index.idf("rust") * (params.k1 + 1.0));
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let corpus = corpus(&["common rare", "common", "common", "common"]);
        let index = Bm25Index::build(&corpus, &SimpleTokenizer::default());
        assert!(index.idf("rare") > index.idf("common"));
        assert!(index.idf("common") > 0.0);
    }

    #[test]
    fn test_length_normalization() {
        let corpus = corpus(&["rust", "rust with many other unrelated words here"]);
        let scorer = scorer();
        let results = scorer.score(&query(&scorer, "rust"), &corpus);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_deterministic() {
        let corpus = corpus(&["alpha beta", "beta gamma", "gamma alpha alpha"]);
        let scorer = scorer();
        let q = query(&scorer, "alpha gamma");
        let first: Vec<f32> = scorer.score(&q, &corpus).iter().map(|c| c.score).collect();
        let second: Vec<f32> = scorer.score(&q, &corpus).iter().map(|c| c.score).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_corpus_and_query() {
        let empty = corpus(&[]);
        let scorer = scorer();
        assert!(scorer.score(&query(&scorer, "anything"), &empty).is_empty());

        let corpus = corpus(&["some text"]);
        let results = scorer.score(&[], &corpus);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn test_empty_documents_do_not_divide_by_zero() {
        let corpus = corpus(&["", ""]);
        let scorer = scorer();
        let results = scorer.score(&query(&scorer, "rust"), &corpus);
        assert!(results.iter().all(|c| c.score == 0.0));
    }
}
