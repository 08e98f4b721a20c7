
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::write_replacing;
use crate::{MemoryError, Result};

const INDEX_MAGIC: [u8; 4] = *b"MIDX";
const INDEX_VERSION: u32 = 1;

/// Flat in-memory vector index with exact squared-L2 search.
///
/// Vectors are stored contiguously in insertion order, so a vector's position
/// is its identity. The dimension is fixed by the first non-empty `add`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    magic: [u8; 4],
    version: u32,
    dimension: Option<usize>,
    data: Vec<f32>,
}

impl VectorIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self.dimension {
            Some(dimension) if dimension > 0 => self.data.len() / dimension,
            _ => 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector stored at `position`
    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let dimension = self.dimension?;
        let start = position.checked_mul(dimension)?;
        self.data.get(start..start.checked_add(dimension)?)
    }

    /// Append vectors. Every vector is checked before any is stored, so a
    /// mismatch leaves the index unchanged.
    #[inline]
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };

        let dimension = self.dimension.unwrap_or(first.len());
        if dimension == 0 {
            return Err(MemoryError::embedding("Refusing to index an empty vector"));
        }

        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(MemoryError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        if self.dimension.is_none() {
            debug!("Vector index dimension set to {}", dimension);
            self.dimension = Some(dimension);
        }

        self.data.reserve(vectors.len() * dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Drop every vector from position `len` onwards
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        if let Some(dimension) = self.dimension {
            self.data.truncate(len.saturating_mul(dimension));
        }
    }

    /// Up to `k` `(position, squared distance)` pairs, nearest first.
    /// Equal distances are ordered by position.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(dimension)
            .enumerate()
            .map(|(position, vector)| (position, squared_l2(query, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// New index holding the vectors at `positions`, in the order given.
    /// The dimension carries over even when no positions survive.
    #[inline]
    pub fn rebuilt_from(&self, positions: &[usize]) -> Result<Self> {
        let mut rebuilt = Self {
            dimension: self.dimension,
            data: Vec::with_capacity(positions.len() * self.dimension.unwrap_or(0)),
        };

        for &position in positions {
            let vector = self
                .vector(position)
                .ok_or_else(|| MemoryError::NotFound(format!("vector at position {}", position)))?;
            rebuilt.data.extend_from_slice(vector);
        }

        debug!(
            "Rebuilt vector index with {} of {} vectors",
            rebuilt.len(),
            self.len()
        );
        Ok(rebuilt)
    }

    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        write_replacing(path, &self.to_bytes()?)?;

        debug!("Saved {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        let file = IndexFile {
            magic: INDEX_MAGIC,
            version: INDEX_VERSION,
            dimension: self.dimension,
            data: self.data.clone(),
        };
        Ok(bincode::serialize(&file)?)
    }

    /// Load an index; `None` when no index file exists
    #[inline]
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(path)?;
        let file: IndexFile = bincode::deserialize(&bytes)?;

        if file.magic != INDEX_MAGIC || file.version != INDEX_VERSION {
            return Err(MemoryError::IndexCorruption {
                vectors: 0,
                records: 0,
            });
        }

        let consistent = match file.dimension {
            Some(0) => false,
            Some(dimension) => file.data.len() % dimension == 0,
            None => file.data.is_empty(),
        };
        if !consistent {
            return Err(MemoryError::IndexCorruption {
                vectors: file.data.len(),
                records: 0,
            });
        }

        let index = Self {
            dimension: file.dimension,
            data: file.data,
        };
        info!("Loaded {} vectors from {}", index.len(), path.display());
        Ok(Some(index))
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
