//! Integration tests for the issue index, including snapshot persistence.

use tempfile::TempDir;
use triagebot_index::{
    DistanceMetric, InMemoryIndex, IndexConfig, IndexRecord, RecordMetadata, VectorIndex,
};

fn issue_record(id: u64, number: u64, title: &str, vector: Vec<f32>) -> IndexRecord {
    IndexRecord {
        id: id.to_string(),
        vector,
        metadata: RecordMetadata {
            number,
            title: title.to_string(),
            state: "open".into(),
        },
        document: format!("{title} body"),
    }
}

fn persistent_config(dir: &TempDir) -> IndexConfig {
    IndexConfig {
        metric: DistanceMetric::Cosine,
        persist_path: Some(dir.path().join("index").join("issues.json")),
    }
}

#[tokio::test]
async fn test_upsert_then_query_returns_own_record() {
    let index = InMemoryIndex::new(DistanceMetric::Cosine);
    let vector = vec![0.2, 0.7, 0.1];
    index
        .upsert(issue_record(1001, 42, "Login page is broken", vector.clone()))
        .await
        .unwrap();

    let hits = index.query(&vector, 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "1001");
    assert_eq!(hits[0].metadata.number, 42);
    assert!(hits[0].distance < 1e-6);
}

#[tokio::test]
async fn test_snapshot_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = persistent_config(&dir);

    {
        let index = InMemoryIndex::open(&config).await.unwrap();
        assert_eq!(index.len().await, 0);
        index
            .upsert(issue_record(1, 10, "Crash on start", vec![1.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert(issue_record(2, 11, "Dark mode", vec![0.0, 1.0]))
            .await
            .unwrap();
    }

    assert!(config.persist_path.as_ref().unwrap().exists());

    let reopened = InMemoryIndex::open(&config).await.unwrap();
    assert_eq!(reopened.len().await, 2);
    let hits = reopened.query(&[1.0, 0.0], 1).await.unwrap();
    assert_eq!(hits[0].metadata.title, "Crash on start");
}

#[tokio::test]
async fn test_reprocessing_does_not_duplicate_storage() {
    let dir = TempDir::new().unwrap();
    let config = persistent_config(&dir);

    let index = InMemoryIndex::open(&config).await.unwrap();
    for _ in 0..3 {
        index
            .upsert(issue_record(5, 5, "Same issue", vec![0.5, 0.5]))
            .await
            .unwrap();
    }
    assert_eq!(index.len().await, 1);

    let reopened = InMemoryIndex::open(&config).await.unwrap();
    assert_eq!(reopened.len().await, 1);
}

#[tokio::test]
async fn test_corrupt_snapshot_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("issues.json");
    std::fs::write(&path, b"not json").unwrap();

    let config = IndexConfig {
        metric: DistanceMetric::Cosine,
        persist_path: Some(path),
    };
    assert!(InMemoryIndex::open(&config).await.is_err());
}

#[tokio::test]
async fn test_memory_only_index_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let index = InMemoryIndex::open(&IndexConfig::default()).await.unwrap();
    index
        .upsert(issue_record(1, 1, "Anything", vec![1.0]))
        .await
        .unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failed_snapshot_write_leaves_index_unchanged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("issues.json");
    let config = IndexConfig {
        metric: DistanceMetric::Cosine,
        persist_path: Some(path.clone()),
    };

    let index = InMemoryIndex::open(&config).await.unwrap();
    index
        .upsert(issue_record(1, 10, "Crash on start", vec![1.0, 0.0]))
        .await
        .unwrap();

    // A directory where the temp file goes makes the next write fail.
    std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
    assert!(
        index
            .upsert(issue_record(2, 11, "Dark mode", vec![0.0, 1.0]))
            .await
            .is_err()
    );

    assert_eq!(index.len().await, 1);
    let hits = index.query(&[0.0, 1.0], 5).await.unwrap();
    assert!(hits.iter().all(|h| h.id != "2"));

    let reopened = InMemoryIndex::open(&config).await.unwrap();
    assert_eq!(reopened.len().await, 1);
}
