// Storage module
// The persisted triple: flat vector index, chunk metadata and content hashes

#[cfg(test)]
mod tests;

pub mod content_cache;
pub mod metadata;
pub mod vector_index;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

pub use content_cache::{ContentCache, content_hash};
pub use metadata::MetadataStore;
pub use vector_index::VectorIndex;

use crate::Result;

pub const INDEX_FILE_NAME: &str = "index.bin";
pub const METADATA_FILE_NAME: &str = "metadata.json";
pub const CONTENT_CACHE_FILE_NAME: &str = "content_cache.json";

/// One chunk of a source document.
///
/// The embedding is not stored here; it is the vector at the same position in
/// the [`VectorIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    #[serde(rename = "source_id", alias = "doc", alias = "url")]
    pub source_id: String,
    #[serde(rename = "chunk", alias = "text")]
    pub text: String,
    pub chunk_id: String,
    #[serde(default)]
    pub position: usize,
}

impl ChunkRecord {
    #[inline]
    pub fn new(source_id: impl Into<String>, text: impl Into<String>, position: usize) -> Self {
        let source_id = source_id.into();
        Self {
            chunk_id: chunk_id_for(&source_id, position),
            source_id,
            text: text.into(),
            position,
        }
    }
}

/// Stable chunk identifier: a short digest of the source id plus the chunk's
/// position within that source
#[inline]
pub fn chunk_id_for(source_id: &str, position: usize) -> String {
    let mut prefix = format!("{:x}", Sha256::digest(source_id.as_bytes()));
    prefix.truncate(16);
    format!("{}_{}", prefix, position)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Write through a sibling temporary file so readers never see a torn file
pub(crate) fn write_replacing(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let staged = staging_path(path);
    std::fs::write(&staged, bytes)?;
    std::fs::rename(&staged, path)
}

/// Save the three stores of a data directory together.
///
/// Every file is serialized and staged before any is renamed into place, so
/// a serialization or write failure leaves the existing files untouched.
/// Leftover staging files are removed on failure.
pub(crate) fn save_triple(
    directory: &Path,
    index: &VectorIndex,
    metadata: &MetadataStore,
    cache: &ContentCache,
) -> Result<()> {
    std::fs::create_dir_all(directory)?;
    let files = [
        (directory.join(INDEX_FILE_NAME), index.to_bytes()?),
        (directory.join(METADATA_FILE_NAME), metadata.to_bytes()?),
        (directory.join(CONTENT_CACHE_FILE_NAME), cache.to_bytes()?),
    ];

    let result = stage_and_rename(&files);
    if result.is_err() {
        for (path, _) in &files {
            let staged = staging_path(path);
            if staged.exists() {
                std::fs::remove_file(&staged).ok();
            }
        }
    }
    result?;

    debug!(
        "Saved {} vectors, {} records and {} content hashes to {}",
        index.len(),
        metadata.len(),
        cache.len(),
        directory.display()
    );
    Ok(())
}

fn stage_and_rename(files: &[(PathBuf, Vec<u8>)]) -> std::io::Result<()> {
    for (path, bytes) in files {
        std::fs::write(staging_path(path), bytes)?;
    }
    for (path, _) in files {
        std::fs::rename(staging_path(path), path)?;
    }
    Ok(())
}
