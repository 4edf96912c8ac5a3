use async_trait::async_trait;
use log::{debug, warn};
use ragfuse_llm::LlmClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default prompt for [`QueryRewriter`]; `{query}` is substituted.
pub const DEFAULT_REWRITE_PROMPT: &str = "You are an AI assistant tasked with reformulating user queries to improve retrieval in a RAG system. \
Given the original query, rewrite it to be more specific, detailed, and likely to retrieve relevant information.\n\n\
Original query: {query}\n\n\
Rewritten query:";

/// Outcome of a rewrite attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrittenQuery {
    pub original: String,
    /// Text to retrieve with; the original when rewriting failed
    pub text: String,
    pub rewritten: bool,
}

impl RewrittenQuery {
    fn unchanged(original: &str) -> Self {
        Self {
            original: original.to_string(),
            text: original.to_string(),
            rewritten: false,
        }
    }
}

/// Reformulates a query before retrieval.
#[async_trait]
pub trait QueryTransform: Send + Sync {
    async fn transform(&self, query: &str) -> RewrittenQuery;
}

/// Asks a language model to make a query more specific.
///
/// Never fails: an error or an empty reply keeps the original text.
pub struct QueryRewriter {
    client: Arc<dyn LlmClient>,
    template: String,
}

impl QueryRewriter {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            template: DEFAULT_REWRITE_PROMPT.to_string(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn prompt(&self, query: &str) -> String {
        self.template.replace("{query}", query)
    }

    pub async fn rewrite(&self, query: &str) -> RewrittenQuery {
        let reply = match self.client.complete(&self.prompt(query)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Query rewrite failed, using original query: {e}");
                return RewrittenQuery::unchanged(query);
            }
        };

        let text = reply.trim().trim_matches('"').trim();
        if text.is_empty() {
            warn!("Query rewrite returned nothing, using original query");
            return RewrittenQuery::unchanged(query);
        }

        debug!("Rewrote query {query:?} as {text:?}");
        RewrittenQuery {
            original: query.to_string(),
            text: text.to_string(),
            rewritten: text != query,
        }
    }
}

#[async_trait]
impl QueryTransform for QueryRewriter {
    async fn transform(&self, query: &str) -> RewrittenQuery {
        self.rewrite(query).await
    }
}
