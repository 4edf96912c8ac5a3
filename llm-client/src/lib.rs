//! # RagFuse LLM
//!
//! The language-model collaborator used by the retrieval core for relevance
//! judging and query rewriting. [`LlmClient`] is the capability
//! (`complete(prompt) -> text`); [`ChatCompletionsClient`] implements it
//! against any OpenAI-compatible `/chat/completions` endpoint using typed
//! request and response structs.
//!
//! ```no_run
//! use ragfuse_llm::{ChatCompletionsClient, LlmClient, LlmClientConfig};
//!
//! # async fn run() -> ragfuse_llm::Result<()> {
//! let config = LlmClientConfig::default().with_api_key("sk-...");
//! let client = ChatCompletionsClient::new(config)?;
//! let answer = client.complete("Rate the relevance from 1 to 10: ...").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;

pub use client::{
    ChatChoice, ChatChoiceMessage, ChatCompletionRequest, ChatCompletionResponse,
    ChatCompletionsClient, ChatMessage, ChatRole, LlmClient,
};
pub use config::LlmClientConfig;
pub use error::{LlmError, Result};
