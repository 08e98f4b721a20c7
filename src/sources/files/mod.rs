
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::convert::{DocumentFormat, convert};
use super::{SourceDocument, SourceFailure, SourceRead, SourceReader};
use crate::{MemoryError, Result};

/// Reads the regular files directly inside one directory, in name order.
/// Subdirectories and hidden files are ignored.
#[derive(Debug)]
pub struct FileSourceReader {
    directory: PathBuf,
    pending: VecDeque<PathBuf>,
}

impl FileSourceReader {
    #[inline]
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        if !directory.is_dir() {
            return Err(MemoryError::NotFound(format!(
                "documents directory {}",
                directory.display()
            )));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&directory)? {
            let entry = entry?;
            let is_hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !is_hidden && entry.path().is_file() {
                files.push(entry.path());
            }
        }
        files.sort();

        info!(
            "Found {} files to read in {}",
            files.len(),
            directory.display()
        );
        Ok(Self {
            directory,
            pending: files.into(),
        })
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Modification time of a file, when the platform reports one
#[inline]
pub fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

async fn read_document(path: &Path, source_id: &str) -> Result<SourceDocument> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| MemoryError::conversion(source_id, e.to_string()))?;
    let content = convert(source_id, DocumentFormat::from_path(path), &bytes)?;

    Ok(SourceDocument {
        source_id: source_id.to_string(),
        content,
        last_modified: modified_time(path),
    })
}

#[async_trait]
impl SourceReader for FileSourceReader {
    async fn next_source(&mut self) -> Option<SourceRead> {
        let path = self.pending.pop_front()?;
        let source_id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Reading {}", path.display());
        Some(
            read_document(&path, &source_id)
                .await
                .map_err(|error| SourceFailure { source_id, error }),
        )
    }

    #[inline]
    fn remaining_hint(&self) -> Option<usize> {
        Some(self.pending.len())
    }
}
