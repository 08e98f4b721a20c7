
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::write_replacing;
use crate::Result;

/// Lowercase hex SHA-256 of raw source content
#[inline]
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Last ingested content hash per source, persisted as a JSON object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentCache {
    entries: BTreeMap<String, String>,
}

impl ContentCache {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, source_id: &str) -> Option<&str> {
        self.entries.get(source_id).map(String::as_str)
    }

    #[inline]
    pub fn put(&mut self, source_id: impl Into<String>, hash: impl Into<String>) {
        self.entries.insert(source_id.into(), hash.into());
    }

    #[inline]
    pub fn remove(&mut self, source_id: &str) -> Option<String> {
        self.entries.remove(source_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Drop entries whose source fails `keep`
    #[inline]
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|source_id, _| keep(source_id));
    }

    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        write_replacing(path, &self.to_bytes()?)?;

        debug!("Saved {} content hashes to {}", self.entries.len(), path.display());
        Ok(())
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.entries)?)
    }

    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let bytes = std::fs::read(path)?;
        let entries: BTreeMap<String, String> = serde_json::from_slice(&bytes)?;

        debug!("Loaded {} content hashes from {}", entries.len(), path.display());
        Ok(Self { entries })
    }
}
