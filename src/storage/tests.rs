use super::*;

#[test]
fn chunk_id_is_stable_and_scoped() {
    let first = chunk_id_for("doc1", 0);
    assert_eq!(first, chunk_id_for("doc1", 0));
    assert_eq!(first, "c63ebdcbe00c06b7_0");
    assert!(first.ends_with("_0"));
    assert_ne!(first, chunk_id_for("doc1", 1));
    assert_ne!(first, chunk_id_for("doc2", 0));
}

#[test]
fn record_serializes_normalized_keys() {
    let record = ChunkRecord::new("doc1", "a b c", 2);
    let json = serde_json::to_value(&record).expect("should serialize");

    assert_eq!(json["source_id"], "doc1");
    assert_eq!(json["chunk"], "a b c");
    assert_eq!(json["position"], 2);
    assert_eq!(json["chunk_id"], chunk_id_for("doc1", 2));
}

#[test]
fn record_accepts_legacy_keys() {
    let from_doc: ChunkRecord =
        serde_json::from_str(r#"{"doc": "notes.pdf", "chunk": "hello", "chunk_id": "x_0"}"#)
            .expect("should parse doc key");
    assert_eq!(from_doc.source_id, "notes.pdf");
    assert_eq!(from_doc.position, 0);

    let from_url: ChunkRecord = serde_json::from_str(
        r#"{"url": "https://example.com", "text": "hi", "chunk_id": "y_3", "position": 3}"#,
    )
    .expect("should parse url key");
    assert_eq!(from_url.source_id, "https://example.com");
    assert_eq!(from_url.text, "hi");
    assert_eq!(from_url.position, 3);
}
