// Thread-safe handle around an IndexManager
// Mutations serialize on a write lock; reads share a read lock so they never
// observe a half-applied mutation

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    ConsistencyReport, DeleteOutcome, IndexManager, IndexStats, IngestOutcome, SearchHit,
    SourceSummary,
};
use crate::{MemoryError, Result};

#[derive(Debug, Clone)]
pub struct SharedIndexManager {
    inner: Arc<RwLock<IndexManager>>,
}

impl SharedIndexManager {
    #[inline]
    pub fn new(manager: IndexManager) -> Self {
        Self {
            inner: Arc::new(RwLock::new(manager)),
        }
    }

    #[inline]
    pub fn read(&self) -> Result<RwLockReadGuard<'_, IndexManager>> {
        self.inner.read().map_err(|_| MemoryError::LockPoisoned)
    }

    #[inline]
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, IndexManager>> {
        self.inner.write().map_err(|_| MemoryError::LockPoisoned)
    }

    #[inline]
    pub fn ingest(&self, source_id: &str, raw_content: &str) -> Result<IngestOutcome> {
        self.write()?.ingest(source_id, raw_content)
    }

    #[inline]
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.read()?.search(query, k)
    }

    #[inline]
    pub fn delete(&self, source_id: &str) -> Result<DeleteOutcome> {
        self.write()?.delete(source_id)
    }

    #[inline]
    pub fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        Ok(self.read()?.list_sources())
    }

    #[inline]
    pub fn stats(&self) -> Result<IndexStats> {
        Ok(self.read()?.stats())
    }

    #[inline]
    pub fn validate(&self) -> Result<ConsistencyReport> {
        Ok(self.read()?.validate())
    }

    #[inline]
    pub fn repair(&self) -> Result<usize> {
        self.write()?.repair()
    }

    #[inline]
    pub fn flush(&self) -> Result<()> {
        self.read()?.flush()
    }
}

impl From<IndexManager> for SharedIndexManager {
    #[inline]
    fn from(manager: IndexManager) -> Self {
        Self::new(manager)
    }
}
