//! Database error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Schema initialization failed: {0}")]
    SchemaInit(String),

    #[error("Embeddings dimension {actual} doesn't match {table} dimension {expected}")]
    DimensionMismatch {
        table: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Number of embeddings ({embeddings}) must match metadata ({metadata})")]
    LengthMismatch { embeddings: usize, metadata: usize },

    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
