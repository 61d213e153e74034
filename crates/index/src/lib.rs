//! Vectorization gateway and nearest-neighbor index for TriageBot.
//!
//! Issues are embedded with a local model and stored as one record per
//! issue id. Duplicate detection queries the index before upserting the
//! current issue.
//!
//! ```text
//!   issue text ──► Embedder ──► vector ──► VectorIndex::query (k nearest)
//!                                    └───► VectorIndex::upsert (id, vector, metadata, text)
//! ```

pub mod embedding;
pub mod store;
pub mod types;

pub use embedding::{DisabledEmbedder, Embedder, FastEmbedder, build_embedder};
pub use store::{InMemoryIndex, VectorIndex};
pub use types::{DistanceMetric, EmbeddingConfig, IndexConfig, IndexRecord, Neighbor, RecordMetadata};
