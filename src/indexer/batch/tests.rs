use super::*;
use crate::MemoryError;
use crate::embeddings::{ChunkingConfig, HashEmbedder};
use crate::sources::{FileSourceReader, SourceDocument, SourceFailure, SourceRead};
use async_trait::async_trait;
use std::collections::VecDeque;
use tempfile::TempDir;

struct VecReader {
    reads: VecDeque<SourceRead>,
}

impl VecReader {
    fn new(reads: Vec<SourceRead>) -> Self {
        Self {
            reads: reads.into(),
        }
    }
}

#[async_trait]
impl SourceReader for VecReader {
    async fn next_source(&mut self) -> Option<SourceRead> {
        self.reads.pop_front()
    }

    fn remaining_hint(&self) -> Option<usize> {
        Some(self.reads.len())
    }
}

fn document(source_id: &str, content: &str) -> SourceRead {
    Ok(SourceDocument {
        source_id: source_id.to_string(),
        content: content.to_string(),
        last_modified: None,
    })
}

fn open_manager(dir: &std::path::Path) -> IndexManager {
    IndexManager::open(
        dir,
        Box::new(HashEmbedder::new(16)),
        ChunkingConfig::Words {
            size: 4,
            overlap: 0,
        },
    )
    .expect("should open index")
}

#[tokio::test]
async fn failures_are_counted_and_batch_continues() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut manager = open_manager(temp_dir.path());
    let mut reader = VecReader::new(vec![
        document("one", "a b c d e"),
        Err(SourceFailure {
            source_id: "broken".to_string(),
            error: MemoryError::conversion("broken", "unreadable"),
        }),
        document("two", "f g"),
    ]);

    let stats = ingest_from(&mut reader, &mut manager)
        .await
        .expect("batch should run");

    assert_eq!(
        stats,
        BatchStats {
            sources_seen: 3,
            ingested: 2,
            skipped: 0,
            failed: 1,
            chunks_added: 3,
        }
    );
    assert_eq!(manager.len(), 3);
}

#[tokio::test]
async fn second_pass_skips_unchanged_sources() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let docs = TempDir::new().expect("should create temp dir");
    std::fs::write(docs.path().join("a.txt"), "alpha beta").expect("write");
    std::fs::write(docs.path().join("b.md"), "# Beta\n\ngamma delta").expect("write");
    let mut manager = open_manager(temp_dir.path());

    let mut reader = FileSourceReader::new(docs.path()).expect("open dir");
    let first = ingest_from(&mut reader, &mut manager)
        .await
        .expect("batch should run");
    assert_eq!(first.ingested, 2);

    std::fs::write(docs.path().join("b.md"), "# Beta\n\nchanged").expect("write");
    let mut reader = FileSourceReader::new(docs.path()).expect("open dir");
    let second = ingest_from(&mut reader, &mut manager)
        .await
        .expect("batch should run");

    assert_eq!(second.skipped, 1);
    assert_eq!(second.ingested, 1);
    assert_eq!(manager.list_sources().len(), 2);
}

#[tokio::test]
async fn corrupted_index_refuses_batch() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut manager = open_manager(temp_dir.path());
    manager.ingest("doc", "a b c d e f g h").expect("ingest");
    drop(manager);
    std::fs::remove_file(temp_dir.path().join(crate::storage::INDEX_FILE_NAME))
        .expect("remove index");

    let mut manager = open_manager(temp_dir.path());
    let mut reader = VecReader::new(vec![document("new", "text")]);

    let result = ingest_from(&mut reader, &mut manager).await;

    assert!(matches!(result, Err(MemoryError::IndexCorruption { .. })));
    assert_eq!(reader.remaining_hint(), Some(1));
}
