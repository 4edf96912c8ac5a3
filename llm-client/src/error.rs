use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion request failed: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Completion response contained no choices")]
    EmptyResponse,

    #[error("Invalid LLM client configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
