//! Duplicate detection over the issue index.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use triagebot_common::{DuplicateMatch, Issue, SimilarityResult};
use triagebot_index::{Embedder, IndexRecord, Neighbor, RecordMetadata, VectorIndex};

/// How a non-self neighbor qualifies as a duplicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateRule {
    /// Neighbor distance must be within [`SimilarityConfig::max_distance`]
    #[default]
    Threshold,
    /// Every neighbor returned by the index counts
    AnyNeighbor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum similarity in `[0, 1]`; converted to a distance as `1 - threshold`
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default)]
    pub rule: DuplicateRule,

    /// Explicit distance cutoff, for metrics where `1 - threshold` is meaningless (L2)
    #[serde(default)]
    pub max_distance: Option<f32>,
}

fn default_top_k() -> usize {
    5
}

fn default_threshold() -> f32 {
    0.85
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            threshold: default_threshold(),
            rule: DuplicateRule::default(),
            max_distance: None,
        }
    }
}

impl SimilarityConfig {
    /// Largest distance still counted as a duplicate (inclusive).
    pub fn max_distance(&self) -> f32 {
        self.max_distance
            .unwrap_or_else(|| 1.0 - self.threshold.clamp(0.0, 1.0))
    }

    fn qualifies(&self, distance: f32) -> bool {
        match self.rule {
            DuplicateRule::AnyNeighbor => true,
            DuplicateRule::Threshold => distance <= self.max_distance(),
        }
    }
}

pub struct SimilarityAgent {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: SimilarityConfig,
}

impl SimilarityAgent {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: SimilarityConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Find earlier issues that look like `issue`, then index `issue` itself.
    ///
    /// Never fails. Without a vector the result is empty and nothing is indexed.
    pub async fn detect(&self, issue: &Issue) -> SimilarityResult {
        let text = issue.text();

        let vector = match self.embedder.embed(&text).await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => {
                debug!(issue = issue.number, "Vectorization unavailable, skipping duplicate check");
                return SimilarityResult::empty();
            }
            Err(e) => {
                warn!(issue = issue.number, error = %e, "Vectorization failed, skipping duplicate check");
                return SimilarityResult::empty();
            }
        };

        let neighbors = match self.index.query(&vector, self.config.top_k).await {
            Ok(n) => n,
            Err(e) => {
                warn!(issue = issue.number, error = %e, "Index query failed, treating as no neighbors");
                Vec::new()
            }
        };

        let duplicates = self.select_duplicates(issue, neighbors);
        let result = SimilarityResult::from_matches(duplicates);

        if result.is_duplicate {
            info!(
                issue = issue.number,
                count = result.duplicates.len(),
                nearest = result.duplicates[0].number,
                "Possible duplicates found"
            );
        }

        let record = IndexRecord {
            id: issue.id.to_string(),
            vector,
            metadata: RecordMetadata {
                number: issue.number,
                title: issue.title.clone(),
                state: issue.state.clone(),
            },
            document: text,
        };
        if let Err(e) = self.index.upsert(record).await {
            warn!(issue = issue.number, error = %e, "Failed to index issue");
        }

        result
    }

    fn select_duplicates(&self, issue: &Issue, neighbors: Vec<Neighbor>) -> Vec<DuplicateMatch> {
        let own_id = issue.id.to_string();
        neighbors
            .into_iter()
            .filter(|n| n.metadata.number != issue.number && n.id != own_id)
            .filter(|n| {
                let keep = self.config.qualifies(n.distance);
                if !keep {
                    debug!(
                        issue = issue.number,
                        neighbor = n.metadata.number,
                        distance = n.distance,
                        "Neighbor beyond duplicate threshold"
                    );
                }
                keep
            })
            .map(|n| DuplicateMatch {
                id: n.id,
                number: n.metadata.number,
                title: n.metadata.title,
                distance: n.distance,
            })
            .collect()
    }
}
