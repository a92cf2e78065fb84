//! Multimodal retriever: text queries against the restaurant index and
//! query images against the photo index.

use crate::inference::{ClipEncoder, TeiClient};
use crate::{AgentError, Result};
use foodfinder_core::{ImageMetadata, TextMetadata};
use foodfinder_db::{IndexStats, IndexTable, Repository};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

/// A photo match: the photo's metadata plus how close it was
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageHit {
    #[serde(flatten)]
    pub metadata: ImageMetadata,
    /// Squared Euclidean distance between CLIP embeddings
    pub distance: f32,
    /// `1 / (1 + distance)`
    pub similarity: f32,
}

impl ImageHit {
    pub fn new(metadata: ImageMetadata, distance: f32) -> Self {
        Self {
            metadata,
            distance,
            similarity: similarity(distance),
        }
    }
}

pub fn similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

pub struct MultimodalRetriever {
    repo: Repository,
    tei: TeiClient,
    clip: ClipEncoder,
    loaded: OnceCell<IndexStats>,
}

impl MultimodalRetriever {
    pub fn new(repo: Repository, tei: TeiClient, clip: ClipEncoder) -> Self {
        Self {
            repo,
            tei,
            clip,
            loaded: OnceCell::new(),
        }
    }

    /// Make sure the indices are usable.
    ///
    /// The text index is required; the image index is optional. A failed
    /// check is not remembered, so a later call tries again.
    #[instrument(skip(self))]
    pub async fn load_indices(&self) -> Result<IndexStats> {
        let stats = self
            .loaded
            .get_or_try_init(|| async {
                let stats = self.repo.stats().await?;
                if stats.text_count == 0 {
                    return Err(AgentError::IndexNotBuilt(format!(
                        "{} is empty",
                        IndexTable::Text.name()
                    )));
                }
                if stats.image_count == 0 {
                    warn!("Image index is empty; image search will return nothing");
                }
                info!(
                    "Loaded indices: {} restaurants, {} photos",
                    stats.text_count, stats.image_count
                );
                Ok(stats)
            })
            .await?;

        Ok(stats.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Restaurants whose text embedding is closest to the query
    #[instrument(skip(self))]
    pub async fn search_text(&self, query: &str, k: usize) -> Result<Vec<TextMetadata>> {
        let embedding = self.tei.embed(query).await?;
        let hits = self.repo.search_text(embedding, k).await?;
        Ok(hits.into_iter().map(|hit| hit.metadata).collect())
    }

    /// Photos closest to the query image, with distance and similarity
    #[instrument(skip(self, image_path), fields(path = %image_path.as_ref().display()))]
    pub async fn search_image(
        &self,
        image_path: impl AsRef<Path>,
        k: usize,
    ) -> Result<Vec<ImageHit>> {
        let embedding = self.clip.embed_image(image_path).await?;
        let hits = self.repo.search_image(embedding, k).await?;
        Ok(hits
            .into_iter()
            .map(|hit| ImageHit::new(hit.metadata, hit.distance))
            .collect())
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn tei(&self) -> &TeiClient {
        &self.tei
    }

    pub fn clip(&self) -> &ClipEncoder {
        &self.clip
    }
}
