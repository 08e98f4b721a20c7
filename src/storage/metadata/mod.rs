
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

use super::ChunkRecord;
use super::write_replacing;
use crate::{MemoryError, Result};

/// On-disk shape of a record. Files written before positions were stored
/// lack the `position` field.
#[derive(Debug, Deserialize)]
struct StoredRecord {
    #[serde(rename = "source_id", alias = "doc", alias = "url")]
    source_id: String,
    #[serde(rename = "chunk", alias = "text")]
    text: String,
    chunk_id: String,
    position: Option<usize>,
}

/// Ordered list of chunk records, persisted as a JSON array.
///
/// Record `p` describes vector `p` of the companion
/// [`VectorIndex`](super::VectorIndex).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    records: Vec<ChunkRecord>,
}

impl MetadataStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&ChunkRecord> {
        self.records.get(position)
    }

    #[inline]
    pub fn all(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// Append records in order. A record whose chunk id already exists for
    /// its source rejects the whole batch.
    #[inline]
    pub fn append(&mut self, records: Vec<ChunkRecord>) -> Result<()> {
        if let Some(duplicate) = self.first_duplicate(&records) {
            return Err(MemoryError::DuplicateChunk {
                source_id: duplicate.source_id.clone(),
                chunk_id: duplicate.chunk_id.clone(),
            });
        }

        debug!("Appending {} metadata records", records.len());
        self.records.extend(records);
        Ok(())
    }

    fn first_duplicate<'a>(&self, records: &'a [ChunkRecord]) -> Option<&'a ChunkRecord> {
        let mut seen: HashSet<(&str, &str)> = self
            .records
            .iter()
            .map(|r| (r.source_id.as_str(), r.chunk_id.as_str()))
            .collect();

        records
            .iter()
            .find(|r| !seen.insert((r.source_id.as_str(), r.chunk_id.as_str())))
    }

    #[inline]
    pub fn filter_by_source(&self, source_id: &str) -> Vec<&ChunkRecord> {
        self.records
            .iter()
            .filter(|r| r.source_id == source_id)
            .collect()
    }

    #[inline]
    pub fn contains_source(&self, source_id: &str) -> bool {
        self.records.iter().any(|r| r.source_id == source_id)
    }

    /// Distinct source ids in order of first appearance
    #[inline]
    pub fn sources(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|r| r.source_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Replace the contents with `keep`
    #[inline]
    pub fn rebuild(&mut self, keep: Vec<ChunkRecord>) {
        debug!(
            "Rebuilding metadata store: {} -> {} records",
            self.records.len(),
            keep.len()
        );
        self.records = keep;
    }

    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        write_replacing(path, &self.to_bytes()?)?;

        debug!("Saved {} metadata records to {}", self.records.len(), path.display());
        Ok(())
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.records)?)
    }

    /// Load the store; a missing file is an empty store
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No metadata file at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let bytes = std::fs::read(path)?;
        let stored: Vec<StoredRecord> = serde_json::from_slice(&bytes)?;

        // A missing position continues the numbering of the record's source
        let mut next_position: HashMap<String, usize> = HashMap::new();
        let records: Vec<ChunkRecord> = stored
            .into_iter()
            .map(|record| {
                let next = next_position.entry(record.source_id.clone()).or_default();
                let position = record.position.unwrap_or(*next);
                *next = position + 1;
                ChunkRecord {
                    source_id: record.source_id,
                    text: record.text,
                    chunk_id: record.chunk_id,
                    position,
                }
            })
            .collect();

        info!("Loaded {} metadata records from {}", records.len(), path.display());
        Ok(Self { records })
    }
}
