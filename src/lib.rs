use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Storage integrity error: {0}")]
    StorageIntegrity(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate document id in a single add: {0}")]
    DuplicateDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<config::ConfigError> for RagError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod engine;

pub use engine::{Document, NO_RESULTS, RagEngine, SearchHit, SharedRagEngine};
