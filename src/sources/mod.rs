// Source readers
// Pluggable producers of raw documents for batch ingestion

pub mod convert;
pub mod files;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::MemoryError;

pub use convert::{DocumentFormat, convert, markdown_to_text};
pub use files::FileSourceReader;

/// A document ready to hand to the index manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub source_id: String,
    pub content: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// A source that could not be read or converted. The batch moves on.
#[derive(Debug)]
pub struct SourceFailure {
    pub source_id: String,
    pub error: MemoryError,
}

impl std::fmt::Display for SourceFailure {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source_id, self.error)
    }
}

pub type SourceRead = Result<SourceDocument, SourceFailure>;

/// Yields documents one at a time until exhausted
#[async_trait]
pub trait SourceReader: Send {
    async fn next_source(&mut self) -> Option<SourceRead>;

    /// Number of sources still to come, when known up front
    fn remaining_hint(&self) -> Option<usize> {
        None
    }
}
