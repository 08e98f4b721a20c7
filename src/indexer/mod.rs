// Indexer module
// Owns the vector index, metadata and content cache triple and keeps them aligned

pub mod batch;
pub mod consistency;
pub mod shared;


use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::embeddings::{ChunkingConfig, Embedder, chunk_text, create_embedder};
use crate::sources::files::modified_time;
use crate::storage::{
    CONTENT_CACHE_FILE_NAME, ChunkRecord, ContentCache, INDEX_FILE_NAME, METADATA_FILE_NAME,
    MetadataStore, VectorIndex, content_hash, save_triple,
};
use crate::{MemoryError, Result};

pub use batch::{BatchStats, ingest_from};
pub use consistency::{ConsistencyReport, ConsistencyValidator};
pub use shared::SharedIndexManager;

/// Result of one `ingest` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub chunks_added: usize,
    /// Content was identical to what is already indexed; nothing changed
    pub skipped: bool,
}

/// One search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record: ChunkRecord,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub source_id: String,
    pub chunk_count: usize,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub num_chunks: usize,
    pub num_sources: usize,
    pub embedding_dimension: Option<usize>,
    pub index_type: &'static str,
    pub model: String,
}

/// Orchestrates chunking, embedding and storage for a data directory.
///
/// After every public operation the vector at position `p` is the embedding
/// of metadata record `p`. Every successful mutation is persisted before it
/// returns; a failed one leaves memory and disk as they were.
pub struct IndexManager {
    directory: PathBuf,
    embedder: Box<dyn Embedder>,
    chunking: ChunkingConfig,
    documents_dir: Option<PathBuf>,
    index: VectorIndex,
    metadata: MetadataStore,
    cache: ContentCache,
    corrupted: bool,
}

impl std::fmt::Debug for IndexManager {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("directory", &self.directory)
            .field("model", &self.embedder.model_name())
            .field("vectors", &self.index.len())
            .field("records", &self.metadata.len())
            .field("corrupted", &self.corrupted)
            .finish_non_exhaustive()
    }
}

impl IndexManager {
    /// Load the triple stored in `directory`. Missing files start empty.
    ///
    /// A triple whose index and metadata disagree still opens, but search,
    /// ingest and delete are refused until [`IndexManager::repair`] runs.
    #[inline]
    pub fn open(
        directory: impl Into<PathBuf>,
        embedder: Box<dyn Embedder>,
        chunking: ChunkingConfig,
    ) -> Result<Self> {
        let directory = directory.into();
        chunking.validate()?;

        let metadata = MetadataStore::load(&directory.join(METADATA_FILE_NAME))?;
        let cache = ContentCache::load(&directory.join(CONTENT_CACHE_FILE_NAME))?;
        let index = match VectorIndex::load(&directory.join(INDEX_FILE_NAME)) {
            Ok(Some(index)) => index,
            Ok(None) => VectorIndex::new(),
            Err(e @ (MemoryError::IndexCorruption { .. } | MemoryError::Serialization(_))) => {
                warn!("Unreadable vector index in {}: {}", directory.display(), e);
                VectorIndex::new()
            }
            Err(e) => return Err(e),
        };

        let corrupted = index.len() != metadata.len();
        if corrupted {
            warn!(
                "Index corruption: {} vectors but {} metadata records; run repair before searching",
                index.len(),
                metadata.len()
            );
        }

        info!(
            "Opened index at {} with {} chunks from {} sources",
            directory.display(),
            metadata.len(),
            metadata.sources().len()
        );

        Ok(Self {
            directory,
            embedder,
            chunking,
            documents_dir: None,
            index,
            metadata,
            cache,
            corrupted,
        })
    }

    /// Open the data directory of `config` with the embedder it selects
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        Ok(
            Self::open(config.get_base_dir(), embedder, config.chunking.clone())?
                .with_documents_dir(config.storage.documents_dir.clone()),
        )
    }

    /// Directory whose files supply `last_modified` in [`IndexManager::list_sources`]
    #[inline]
    #[must_use]
    pub fn with_documents_dir(mut self, documents_dir: Option<PathBuf>) -> Self {
        self.documents_dir = documents_dir;
        self
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[inline]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    #[inline]
    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    #[inline]
    pub fn records(&self) -> &[ChunkRecord] {
        self.metadata.all()
    }

    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        self.index.vector(position)
    }

    /// Chunk, embed and index one source.
    ///
    /// Unchanged content is skipped without touching any store. Changed
    /// content replaces every chunk previously indexed for the source.
    #[inline]
    pub fn ingest(&mut self, source_id: &str, raw_content: &str) -> Result<IngestOutcome> {
        self.ensure_consistent()?;

        let hash = content_hash(raw_content);
        if self.cache.get(source_id) == Some(hash.as_str()) {
            debug!("Skipping unchanged source {}", source_id);
            return Ok(IngestOutcome {
                chunks_added: 0,
                skipped: true,
            });
        }

        let chunks = chunk_text(raw_content, &self.chunking)?;
        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&chunks)?
        };
        if embeddings.len() != chunks.len() {
            return Err(MemoryError::embedding(format!(
                "Expected {} embeddings for {}, got {}",
                chunks.len(),
                source_id,
                embeddings.len()
            )));
        }

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .enumerate()
            .map(|(position, text)| ChunkRecord::new(source_id, text, position))
            .collect();
        let chunks_added = records.len();

        let (mut index, mut metadata) = if self.metadata.contains_source(source_id) {
            info!("Content of {} changed, replacing its chunks", source_id);
            self.without_source(source_id)?
        } else {
            (self.index.clone(), self.metadata.clone())
        };
        index.add(&embeddings)?;
        metadata.append(records)?;
        let mut cache = self.cache.clone();
        cache.put(source_id, hash);

        self.commit(index, metadata, cache)?;

        info!("Indexed {} chunks from {}", chunks_added, source_id);
        Ok(IngestOutcome {
            chunks_added,
            skipped: false,
        })
    }

    /// Nearest chunks to `query`, closest first
    #[inline]
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.ensure_consistent()?;

        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query)?;
        let matches = self.index.search(&query_embedding, k)?;

        let hits: Vec<SearchHit> = matches
            .into_iter()
            .filter_map(|(position, distance)| match self.metadata.get(position) {
                Some(record) => Some(SearchHit {
                    record: record.clone(),
                    distance,
                }),
                None => {
                    debug!("Search returned position {} with no metadata record", position);
                    None
                }
            })
            .collect();

        debug!("Search for {:?} returned {} hits", query, hits.len());
        Ok(hits)
    }

    /// Remove every chunk of a source and rebuild the index from the rest
    #[inline]
    pub fn delete(&mut self, source_id: &str) -> Result<DeleteOutcome> {
        self.ensure_consistent()?;

        if !self.metadata.contains_source(source_id) {
            if self.cache.get(source_id).is_some() {
                let mut cache = self.cache.clone();
                cache.remove(source_id);
                self.write_files(&self.index, &self.metadata, &cache)?;
                self.cache = cache;
            }
            info!("No chunks indexed for {}, nothing to delete", source_id);
            return Ok(DeleteOutcome { deleted: false });
        }

        let removed = self.metadata.filter_by_source(source_id).len();
        let (index, metadata) = self.without_source(source_id)?;
        let mut cache = self.cache.clone();
        cache.remove(source_id);
        self.commit(index, metadata, cache)?;

        info!("Deleted {} chunks of {}", removed, source_id);
        Ok(DeleteOutcome { deleted: true })
    }

    /// Indexed sources in order of first ingestion
    #[inline]
    pub fn list_sources(&self) -> Vec<SourceSummary> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in self.metadata.all() {
            *counts.entry(record.source_id.as_str()).or_default() += 1;
        }

        self.metadata
            .sources()
            .into_iter()
            .map(|source_id| SourceSummary {
                source_id: source_id.to_string(),
                chunk_count: counts.get(source_id).copied().unwrap_or_default(),
                last_modified: self
                    .documents_dir
                    .as_ref()
                    .and_then(|dir| modified_time(&dir.join(source_id))),
            })
            .collect()
    }

    #[inline]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            num_chunks: self.metadata.len(),
            num_sources: self.metadata.sources().len(),
            embedding_dimension: self.index.dimension(),
            index_type: "flat-l2",
            model: self.embedder.model_name().to_string(),
        }
    }

    /// Check the alignment of the triple without changing anything
    #[inline]
    pub fn validate(&self) -> ConsistencyReport {
        ConsistencyValidator::new(&self.index, &self.metadata, &self.cache).validate()
    }

    /// Rebuild the vector index by re-embedding every record's text, and drop
    /// cache entries of sources that have no records. Returns the number of
    /// chunks re-embedded.
    #[inline]
    pub fn repair(&mut self) -> Result<usize> {
        info!(
            "Repairing index: re-embedding {} chunks",
            self.metadata.len()
        );

        let texts: Vec<String> = self
            .metadata
            .all()
            .iter()
            .map(|record| record.text.clone())
            .collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts)?
        };
        if embeddings.len() != texts.len() {
            return Err(MemoryError::embedding(format!(
                "Expected {} embeddings during repair, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let mut index = VectorIndex::new();
        index.add(&embeddings)?;

        let metadata = &self.metadata;
        let mut cache = self.cache.clone();
        cache.retain(|source_id| metadata.contains_source(source_id));
        // The files on disk are the misaligned ones, so there is nothing to restore
        save_triple(&self.directory, &index, &self.metadata, &cache)?;
        self.index = index;
        self.cache = cache;
        self.corrupted = false;

        info!("Repair complete, {} vectors indexed", self.index.len());
        Ok(texts.len())
    }

    /// Write the triple to the data directory
    #[inline]
    pub fn flush(&self) -> Result<()> {
        if self.corrupted {
            warn!("Not flushing a misaligned index; run repair first");
            return Ok(());
        }
        self.persist()
    }

    #[inline]
    pub fn close(self) -> Result<()> {
        self.flush()?;
        debug!("Closed index at {}", self.directory.display());
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        save_triple(&self.directory, &self.index, &self.metadata, &self.cache)
    }

    /// Persist a candidate triple, then make it the current one. On failure
    /// memory is untouched and the files of the current triple are written
    /// back.
    fn commit(
        &mut self,
        index: VectorIndex,
        metadata: MetadataStore,
        cache: ContentCache,
    ) -> Result<()> {
        self.write_files(&index, &metadata, &cache)?;
        self.index = index;
        self.metadata = metadata;
        self.cache = cache;
        Ok(())
    }

    fn write_files(
        &self,
        index: &VectorIndex,
        metadata: &MetadataStore,
        cache: &ContentCache,
    ) -> Result<()> {
        let Err(e) = save_triple(&self.directory, index, metadata, cache) else {
            return Ok(());
        };

        warn!(
            "Failed to save index to {}: {}; restoring previous files",
            self.directory.display(),
            e
        );
        if let Err(restore_error) = self.persist() {
            error!(
                "Could not restore index files in {}: {}",
                self.directory.display(),
                restore_error
            );
        }
        Err(e)
    }

    /// Index and metadata with every record of `source_id` removed, survivors
    /// kept in their original order
    fn without_source(&self, source_id: &str) -> Result<(VectorIndex, MetadataStore)> {
        let (positions, survivors): (Vec<usize>, Vec<ChunkRecord>) = self
            .metadata
            .all()
            .iter()
            .enumerate()
            .filter(|(_, record)| record.source_id != source_id)
            .map(|(position, record)| (position, record.clone()))
            .unzip();

        let index = self.index.rebuilt_from(&positions)?;
        let mut metadata = MetadataStore::new();
        metadata.rebuild(survivors);
        Ok((index, metadata))
    }

    pub(crate) fn ensure_consistent(&self) -> Result<()> {
        if self.corrupted {
            return Err(MemoryError::IndexCorruption {
                vectors: self.index.len(),
                records: self.metadata.len(),
            });
        }
        Ok(())
    }
}
