// Consistency validation for the persisted triple
// Checks that vectors, metadata records and content hashes describe the same sources


use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::storage::{ContentCache, MetadataStore, VectorIndex};

/// Consistency check results for one index directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Number of vectors in the index
    pub vectors: usize,
    /// Number of metadata records
    pub records: usize,
    /// Sources with records but no content hash; they will be re-embedded on
    /// the next ingest even when unchanged
    pub uncached_sources: Vec<String>,
    /// Sources whose record positions are not `0..n` in order
    pub misnumbered_sources: Vec<String>,
    /// Overall consistency status
    pub is_consistent: bool,
}

/// Performs consistency validation across the three stores
pub struct ConsistencyValidator<'a> {
    index: &'a VectorIndex,
    metadata: &'a MetadataStore,
    cache: &'a ContentCache,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(index: &'a VectorIndex, metadata: &'a MetadataStore, cache: &'a ContentCache) -> Self {
        Self {
            index,
            metadata,
            cache,
        }
    }

    /// Run every check
    #[inline]
    pub fn validate(&self) -> ConsistencyReport {
        info!("Starting index consistency validation");

        let cached: HashSet<&str> = self.cache.iter().map(|(source_id, _)| source_id).collect();
        let uncached_sources: Vec<String> = self
            .metadata
            .sources()
            .into_iter()
            .filter(|source_id| !cached.contains(source_id))
            .map(str::to_string)
            .collect();

        let misnumbered_sources = self.misnumbered_sources();

        let vectors = self.index.len();
        let records = self.metadata.len();
        let is_consistent = vectors == records && misnumbered_sources.is_empty();

        let report = ConsistencyReport {
            vectors,
            records,
            uncached_sources,
            misnumbered_sources,
            is_consistent,
        };

        if report.is_consistent {
            info!("Index consistency validation passed");
        } else {
            warn!("Index consistency validation found issues");
            log_consistency_issues(&report);
        }
        report
    }

    fn misnumbered_sources(&self) -> Vec<String> {
        let mut next_position: BTreeMap<&str, usize> = BTreeMap::new();
        let mut misnumbered: Vec<String> = Vec::new();

        for record in self.metadata.all() {
            let expected = next_position.entry(record.source_id.as_str()).or_default();
            if record.position != *expected && !misnumbered.contains(&record.source_id) {
                misnumbered.push(record.source_id.clone());
            }
            *expected += 1;
        }
        misnumbered
    }
}

fn log_consistency_issues(report: &ConsistencyReport) {
    if report.vectors != report.records {
        warn!(
            "Found {} vectors for {} metadata records",
            report.vectors, report.records
        );
    }

    for source_id in &report.misnumbered_sources {
        warn!("Source {} has out-of-order chunk positions", source_id);
    }
}

impl ConsistencyReport {
    /// Get a human-readable summary of the consistency report
    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            format!(
                "Index is consistent: {} vectors, {} records",
                self.vectors, self.records
            )
        } else {
            format!(
                "Index inconsistencies found: {} vectors vs {} records, {} sources with misnumbered chunks",
                self.vectors,
                self.records,
                self.misnumbered_sources.len()
            )
        }
    }

    /// Get the total number of consistency issues
    #[inline]
    pub fn total_issues(&self) -> usize {
        usize::from(self.vectors != self.records) + self.misnumbered_sources.len()
    }
}
