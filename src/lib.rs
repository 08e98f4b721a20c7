use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to convert source {source_id}: {reason}")]
    Conversion { source_id: String, reason: String },

    #[error("Embedding error{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Embedding {
        status: Option<u16>,
        message: String,
    },

    #[error("Dimension mismatch: index holds {expected}-d vectors, got {actual}-d")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index corruption: {vectors} vectors but {records} metadata records")]
    IndexCorruption { vectors: usize, records: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate chunk {chunk_id} for source {source_id}")]
    DuplicateChunk { source_id: String, chunk_id: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Index lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl MemoryError {
    #[inline]
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            status: None,
            message: message.into(),
        }
    }

    #[inline]
    pub fn conversion(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conversion {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }
}

pub mod commands;
pub mod config;
pub mod crawler;
pub mod embeddings;
pub mod indexer;
pub mod sources;
pub mod storage;
