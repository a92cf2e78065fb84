//! CLIP ViT-B/32 encoders (image and text towers) run locally through fastembed.
//!
//! Both towers are loaded on first use; ONNX inference is blocking and is
//! moved off the async runtime with `spawn_blocking`.

use super::env_or_default;
use crate::{AgentError, Result};
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use foodfinder_db::schema::IMAGE_DIMENSION;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

const DEFAULT_CACHE_DIR: &str = ".fastembed_cache";

struct ClipModels {
    image: Mutex<ImageEmbedding>,
    text: Mutex<TextEmbedding>,
}

/// Lazily-initialised CLIP image and text encoders sharing one embedding space
#[derive(Clone)]
pub struct ClipEncoder {
    cache_dir: PathBuf,
    show_progress: bool,
    models: Arc<OnceCell<Arc<ClipModels>>>,
}

impl ClipEncoder {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            show_progress: false,
            models: Arc::new(OnceCell::new()),
        }
    }

    /// Cache directory from `FASTEMBED_CACHE_DIR`
    pub fn default_local() -> Self {
        Self::new(env_or_default("FASTEMBED_CACHE_DIR", DEFAULT_CACHE_DIR))
    }

    pub fn with_download_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Whether the models have been loaded yet
    pub fn is_loaded(&self) -> bool {
        self.models.initialized()
    }

    async fn models(&self) -> Result<Arc<ClipModels>> {
        let models = self
            .models
            .get_or_try_init(|| async {
                let cache_dir = self.cache_dir.clone();
                let show_progress = self.show_progress;
                info!("Loading CLIP ViT-B/32 (cache: {})", cache_dir.display());

                let loaded =
                    tokio::task::spawn_blocking(move || load_models(cache_dir, show_progress))
                        .await
                        .map_err(|e| {
                            AgentError::Embedding(format!("CLIP loader panicked: {}", e))
                        })??;
                Ok::<_, AgentError>(Arc::new(loaded))
            })
            .await?;

        Ok(Arc::clone(models))
    }

    /// Embed one image file
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub async fn embed_image(&self, path: impl AsRef<Path>) -> Result<Vec<f32>> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(AgentError::NotFound(format!(
                "Image not found: {}",
                path.display()
            )));
        }

        let models = self.models().await?;
        let mut embeddings = embed_image_files(models, vec![path]).await?;
        embeddings
            .pop()
            .ok_or_else(|| AgentError::Embedding("CLIP returned no embedding".to_string()))
    }

    /// Embed image files in batches.
    ///
    /// Unreadable or corrupt images are skipped. Returns the embeddings
    /// together with the positions (into `paths`) they belong to. Failing to
    /// load the models is an error, not a skipped image.
    #[instrument(skip(self, paths), fields(count = paths.len()))]
    pub async fn embed_images(
        &self,
        paths: &[PathBuf],
        batch_size: usize,
    ) -> Result<(Vec<Vec<f32>>, Vec<usize>)> {
        if paths.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let models = self.models().await?;
        let batch_size = batch_size.max(1);
        let mut embeddings = Vec::with_capacity(paths.len());
        let mut kept = Vec::with_capacity(paths.len());

        for (chunk_index, chunk) in paths.chunks(batch_size).enumerate() {
            let offset = chunk_index * batch_size;

            match embed_image_files(Arc::clone(&models), chunk.to_vec()).await {
                Ok(batch) if batch.len() == chunk.len() => {
                    embeddings.extend(batch);
                    kept.extend(offset..offset + chunk.len());
                }
                _ => {
                    // Retry one by one so a single bad file only loses itself
                    for (i, path) in chunk.iter().enumerate() {
                        match embed_image_files(Arc::clone(&models), vec![path.clone()]).await {
                            Ok(mut single) if single.len() == 1 => {
                                embeddings.extend(single.pop());
                                kept.push(offset + i);
                            }
                            Ok(_) => warn!("No embedding for {}", path.display()),
                            Err(e) => warn!("Error loading image {}: {}", path.display(), e),
                        }
                    }
                }
            }
            debug!("Embedded {} / {} images", kept.len(), paths.len());
        }

        Ok((embeddings, kept))
    }

    /// Embed short texts with the CLIP text tower (zero-shot labels)
    #[instrument(skip(self, labels), fields(count = labels.len()))]
    pub async fn embed_labels(&self, labels: &[String]) -> Result<Vec<Vec<f32>>> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }

        let models = self.models().await?;
        let labels = labels.to_vec();

        tokio::task::spawn_blocking(move || {
            let encoder = models
                .text
                .lock()
                .map_err(|_| AgentError::Embedding("CLIP text encoder poisoned".to_string()))?;
            encoder
                .embed(labels, None)
                .map(|vectors| vectors.into_iter().map(l2_normalize).collect())
                .map_err(|e| AgentError::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| AgentError::Embedding(format!("CLIP task panicked: {}", e)))?
    }
}

async fn embed_image_files(models: Arc<ClipModels>, paths: Vec<PathBuf>) -> Result<Vec<Vec<f32>>> {
    let embeddings = tokio::task::spawn_blocking(move || {
        let encoder = models
            .image
            .lock()
            .map_err(|_| AgentError::Embedding("CLIP image encoder poisoned".to_string()))?;
        encoder
            .embed(paths, None)
            .map_err(|e| AgentError::Embedding(e.to_string()))
    })
    .await
    .map_err(|e| AgentError::Embedding(format!("CLIP task panicked: {}", e)))??;

    embeddings
        .into_iter()
        .map(|embedding| {
            if embedding.len() != IMAGE_DIMENSION {
                return Err(AgentError::Embedding(format!(
                    "CLIP embedding dimension {} does not match expected {}",
                    embedding.len(),
                    IMAGE_DIMENSION
                )));
            }
            Ok(l2_normalize(embedding))
        })
        .collect()
}

fn load_models(cache_dir: PathBuf, show_progress: bool) -> Result<ClipModels> {
    let image = ImageEmbedding::try_new(
        ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
            .with_cache_dir(cache_dir.clone())
            .with_show_download_progress(show_progress),
    )
    .map_err(|e| AgentError::Embedding(format!("Failed to load CLIP image model: {}", e)))?;

    let text = TextEmbedding::try_new(
        InitOptions::new(EmbeddingModel::ClipVitB32)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(show_progress),
    )
    .map_err(|e| AgentError::Embedding(format!("Failed to load CLIP text model: {}", e)))?;

    Ok(ClipModels {
        image: Mutex::new(image),
        text: Mutex::new(text),
    })
}

fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

/// Cosine similarity; zero when either vector has no length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
