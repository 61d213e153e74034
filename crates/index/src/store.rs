//! Nearest-neighbor index over issue embeddings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use triagebot_common::{Result, TriageError};

use crate::types::{DistanceMetric, IndexConfig, IndexRecord, Neighbor};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite the record with the same id.
    async fn upsert(&self, record: IndexRecord) -> Result<()>;

    /// Up to `k` records nearest to `vector`, ascending by distance.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    async fn len(&self) -> usize;
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    metric: DistanceMetric,
    records: Vec<IndexRecord>,
}

/// Brute-force index held in memory, optionally snapshotted to a JSON file.
///
/// Upserts for the same id are last-writer-wins. When a snapshot path is set,
/// every upsert rewrites the file through a temp file and rename.
pub struct InMemoryIndex {
    metric: DistanceMetric,
    records: RwLock<HashMap<String, IndexRecord>>,
    persist_path: Option<PathBuf>,
}

impl InMemoryIndex {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            records: RwLock::new(HashMap::new()),
            persist_path: None,
        }
    }

    /// Open an index, loading the snapshot file when one exists.
    pub async fn open(config: &IndexConfig) -> Result<Self> {
        let Some(path) = config.persist_path.clone() else {
            return Ok(Self::new(config.metric));
        };

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    TriageError::Index(format!(
                        "Corrupt index snapshot '{}': {e}",
                        path.display()
                    ))
                })?;
                if snapshot.metric != config.metric {
                    warn!(
                        path = %path.display(),
                        stored = ?snapshot.metric,
                        configured = ?config.metric,
                        "Index snapshot was written with a different metric, distances are recomputed"
                    );
                }
                snapshot.records
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            records = records.len(),
            metric = ?config.metric,
            "Opened issue index"
        );

        Ok(Self {
            metric: config.metric,
            records: RwLock::new(records.into_iter().map(|r| (r.id.clone(), r)).collect()),
            persist_path: Some(path),
        })
    }

    async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, record: IndexRecord) -> Result<()> {
        if record.id.is_empty() {
            return Err(TriageError::Index("Record id must not be empty".into()));
        }
        if record.vector.is_empty() {
            return Err(TriageError::Index(format!(
                "Record '{}' has an empty vector",
                record.id
            )));
        }

        let mut records = self.records.write().await;
        debug!(id = %record.id, number = record.metadata.number, "Upserting index record");

        // Memory changes only after the snapshot holds the new record.
        if let Some(ref path) = self.persist_path {
            let mut all: Vec<IndexRecord> = records
                .values()
                .filter(|r| r.id != record.id)
                .cloned()
                .chain(std::iter::once(record.clone()))
                .collect();
            all.sort_by(|a, b| a.id.cmp(&b.id));
            let snapshot = Snapshot {
                metric: self.metric,
                records: all,
            };
            Self::write_snapshot(path, &snapshot).await?;
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if vector.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let records = self.records.read().await;
        let mut skipped = 0usize;
        let mut hits: Vec<Neighbor> = records
            .values()
            .filter(|r| {
                let same_dim = r.vector.len() == vector.len();
                if !same_dim {
                    skipped += 1;
                }
                same_dim
            })
            .map(|r| Neighbor {
                id: r.id.clone(),
                metadata: r.metadata.clone(),
                distance: self.metric.distance(vector, &r.vector),
            })
            .collect();

        if skipped > 0 {
            warn!(skipped, dimension = vector.len(), "Skipped index records with a different dimension");
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}
