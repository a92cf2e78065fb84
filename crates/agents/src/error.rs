//! Agent error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Database error: {0}")]
    Database(#[from] foodfinder_db::DbError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] foodfinder_core::CoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Indices not built: {0}. Run `foodfinder build-indices` first")]
    IndexNotBuilt(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid tool call: {0}")]
    InvalidToolCall(String),

    #[error("Agent stopped after {0} steps without a final answer")]
    StepLimit(usize),
}

pub type Result<T> = std::result::Result<T, AgentError>;
