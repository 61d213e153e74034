//! Text vectorization.
//!
//! [`FastEmbedder`] runs a local fastembed model (all-MiniLM-L6-v2 by
//! default). The model is loaded lazily on the first call and shared by all
//! later calls. An empty vector from any [`Embedder`] means "unavailable".

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use once_cell::sync::OnceCell;
use tokio::task;
use tracing::{debug, info, instrument, warn};
use triagebot_common::{Result, TriageError};

use crate::types::EmbeddingConfig;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Vector for `text`, or an empty vector when vectorization is unavailable.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;

    /// Load any model up front instead of on the first issue.
    async fn warmup(&self) -> Result<()> {
        Ok(())
    }
}

/// Local embedding model backed by fastembed.
pub struct FastEmbedder {
    model_name: EmbeddingModel,
    dimension: usize,
    model: OnceCell<Arc<TextEmbedding>>,
}

/// Known models and their output dimension.
fn lookup_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    let found = match name {
        "all-MiniLM-L6-v2" | "AllMiniLML6V2" => (EmbeddingModel::AllMiniLML6V2, 384),
        "all-MiniLM-L12-v2" | "AllMiniLML12V2" => (EmbeddingModel::AllMiniLML12V2, 384),
        "bge-small-en-v1.5" | "BGESmallENV15" => (EmbeddingModel::BGESmallENV15, 384),
        "bge-base-en-v1.5" | "BGEBaseENV15" => (EmbeddingModel::BGEBaseENV15, 768),
        "bge-large-en-v1.5" | "BGELargeENV15" => (EmbeddingModel::BGELargeENV15, 1024),
        "nomic-embed-text-v1.5" | "NomicEmbedTextV15" => (EmbeddingModel::NomicEmbedTextV15, 768),
        _ => return None,
    };
    Some(found)
}

impl FastEmbedder {
    /// Creates an embedder for a named model. The model is not loaded yet.
    pub fn from_model_str(model_name: &str) -> Result<Self> {
        let (model_name, dimension) = lookup_model(model_name).ok_or_else(|| {
            TriageError::Config(format!(
                "Unknown embedding model: '{model_name}'. Supported models: all-MiniLM-L6-v2, \
                 all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5"
            ))
        })?;
        Ok(Self {
            model_name,
            dimension,
            model: OnceCell::new(),
        })
    }

    /// Creates an embedder from config, rejecting a dimension the model cannot produce.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let embedder = Self::from_model_str(&config.model)?;
        if embedder.dimension != config.dimension {
            return Err(TriageError::Config(format!(
                "Dimension mismatch: model '{}' produces {}-dim vectors but config specifies {}",
                config.model, embedder.dimension, config.dimension
            )));
        }
        Ok(embedder)
    }

    #[instrument(skip(self))]
    fn get_or_init_model(&self) -> Result<Arc<TextEmbedding>> {
        self.model
            .get_or_try_init(|| {
                info!(model = ?self.model_name, "Initializing embedding model");

                let mut options = InitOptions::new(self.model_name.clone());
                options.show_download_progress = false;
                let model = TextEmbedding::try_new(options).map_err(|e| {
                    TriageError::Gateway(format!("Failed to initialize embedding model: {e}"))
                })?;

                info!(
                    model = ?self.model_name,
                    dimension = self.dimension,
                    "Embedding model initialized"
                );
                Ok(Arc::new(model))
            })
            .cloned()
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.get_or_init_model()?;
        let text = text.to_string();

        let embeddings = task::spawn_blocking(move || model.embed(vec![text], None))
            .await
            .map_err(|e| TriageError::Gateway(format!("Embedding task failed: {e}")))?
            .map_err(|e| TriageError::Gateway(format!("Failed to generate embedding: {e}")))?;

        let embedding = embeddings.into_iter().next().unwrap_or_default();
        debug!(dimension = embedding.len(), "Generated embedding");
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn warmup(&self) -> Result<()> {
        if self.model.get().is_some() {
            debug!("Model already initialized, skipping warmup");
            return Ok(());
        }
        info!(model = ?self.model_name, "Warming up embedding model");
        self.get_or_init_model()?;
        Ok(())
    }
}

/// Embedder used when vectorization is switched off. Always "unavailable".
#[derive(Debug, Default)]
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }

    fn dimension(&self) -> usize {
        0
    }
}

/// Build the configured embedder.
///
/// A disabled or unusable configuration degrades to [`DisabledEmbedder`] with
/// a warning; duplicate detection is then skipped for every issue.
pub fn build_embedder(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
    if !config.enabled {
        info!("Embeddings disabled, duplicate detection will be skipped");
        return Arc::new(DisabledEmbedder);
    }
    match FastEmbedder::from_config(config) {
        Ok(embedder) => Arc::new(embedder),
        Err(e) => {
            warn!(error = %e, "Embedding model unusable, duplicate detection will be skipped");
            Arc::new(DisabledEmbedder)
        }
    }
}
