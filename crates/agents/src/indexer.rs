//! Offline index build: embed the processed dataset and fill both indices.

use crate::inference::{ClipEncoder, TeiClient};
use crate::Result;
use foodfinder_core::{ImageMetadata, Restaurant, TextMetadata, TextMode};
use foodfinder_db::{IndexStats, Repository};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

pub const TEXT_BATCH_SIZE: usize = 64;
pub const IMAGE_BATCH_SIZE: usize = 32;

/// Which indices a build run touches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub build_text: bool,
    pub build_image: bool,
    /// Clear a table before building it
    pub force: bool,
}

impl BuildPlan {
    /// Decide what to build from the CLI switches and what already exists.
    ///
    /// An existing index is kept unless `force` is set.
    pub fn decide(
        text_only: bool,
        image_only: bool,
        force: bool,
        existing: &IndexStats,
    ) -> Self {
        let want_text = !image_only;
        let want_image = !text_only;

        Self {
            build_text: want_text && (force || existing.text_count == 0),
            build_image: want_image && (force || existing.image_count == 0),
            force,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.build_text && !self.build_image
    }
}

/// Outcome of building the image index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageBuildReport {
    pub built: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub text: Option<usize>,
    pub image: Option<ImageBuildReport>,
}

/// Outcome of a metadata rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataReport {
    pub text_updated: usize,
    pub text_missing: usize,
    pub image_updated: usize,
    pub image_missing: usize,
}

pub struct Indexer {
    repo: Repository,
    tei: TeiClient,
    clip: ClipEncoder,
}

impl Indexer {
    pub fn new(repo: Repository, tei: TeiClient, clip: ClipEncoder) -> Self {
        Self { repo, tei, clip }
    }

    /// Execute a plan over the loaded restaurants
    pub async fn run(
        &self,
        plan: &BuildPlan,
        restaurants: &[Restaurant],
        mode: TextMode,
        limit: Option<usize>,
    ) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        if plan.build_text {
            if plan.force {
                self.repo.clear_text().await?;
            }
            report.text = Some(self.build_text_index(restaurants, mode).await?);
        }

        if plan.build_image {
            if plan.force {
                self.repo.clear_image().await?;
            }
            report.image = self.build_image_index(restaurants, limit).await?;
        }

        Ok(report)
    }

    /// Embed every restaurant's text rendering and store it with its metadata
    #[instrument(skip(self, restaurants), fields(count = restaurants.len()))]
    pub async fn build_text_index(&self, restaurants: &[Restaurant], mode: TextMode) -> Result<usize> {
        info!("Building text index ({:?} text)", mode);

        let texts: Vec<String> = restaurants.iter().map(|r| mode.render(r)).collect();
        let metadata: Vec<TextMetadata> =
            restaurants.iter().map(TextMetadata::from_restaurant).collect();

        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, chunk) in texts.chunks(TEXT_BATCH_SIZE).enumerate() {
            embeddings.extend(self.tei.embed_batch(chunk).await?);
            info!(
                "Embedded {} / {} texts",
                (i * TEXT_BATCH_SIZE + chunk.len()),
                texts.len()
            );
        }

        let added = self.repo.add_text_entries(embeddings, metadata).await?;
        info!("Text index built with {} restaurants", added);
        Ok(added)
    }

    /// Embed restaurant photos with CLIP and store those that succeed.
    ///
    /// Returns `None` when there is nothing to index.
    #[instrument(skip(self, restaurants), fields(count = restaurants.len()))]
    pub async fn build_image_index(
        &self,
        restaurants: &[Restaurant],
        limit: Option<usize>,
    ) -> Result<Option<ImageBuildReport>> {
        let with_photos = restaurants.iter().filter(|r| r.has_photos()).count();
        info!("Found {} restaurants with photos", with_photos);
        if with_photos == 0 {
            warn!("No photos found, skipping image index");
            return Ok(None);
        }

        let (mut paths, mut metadata) = collect_photos(restaurants);
        info!("Found {} valid image files", paths.len());

        if let Some(limit) = limit.filter(|limit| *limit > 0) {
            paths.truncate(limit);
            metadata.truncate(limit);
            info!("Limiting to {} images", paths.len());
        }

        if paths.is_empty() {
            warn!("No valid image files found, skipping image index");
            return Ok(None);
        }

        let (embeddings, kept) = self.clip.embed_images(&paths, IMAGE_BATCH_SIZE).await?;
        let kept_metadata = select_kept(&metadata, &kept);

        let built = if embeddings.is_empty() {
            0
        } else {
            self.repo.add_image_entries(embeddings, kept_metadata).await?
        };
        let report = ImageBuildReport {
            built,
            skipped: paths.len() - built,
        };

        info!(
            "Image index built with {} photos ({} skipped)",
            report.built, report.skipped
        );
        Ok(Some(report))
    }

    /// Rewrite stored metadata from the dataset without re-embedding
    #[instrument(skip(self, restaurants), fields(count = restaurants.len()))]
    pub async fn rebuild_metadata(
        &self,
        restaurants: &[Restaurant],
        text: bool,
        image: bool,
    ) -> Result<MetadataReport> {
        let mut report = MetadataReport::default();

        if text {
            for restaurant in restaurants {
                if self
                    .repo
                    .update_text_metadata(TextMetadata::from_restaurant(restaurant))
                    .await?
                {
                    report.text_updated += 1;
                } else {
                    report.text_missing += 1;
                }
            }
            info!(
                "Rebuilt {} text metadata entries ({} not indexed)",
                report.text_updated, report.text_missing
            );
        }

        if image {
            let (_, metadata) = collect_photos(restaurants);
            for entry in metadata {
                if self.repo.update_image_metadata(entry).await? {
                    report.image_updated += 1;
                } else {
                    report.image_missing += 1;
                }
            }
            info!(
                "Rebuilt {} image metadata entries ({} not indexed)",
                report.image_updated, report.image_missing
            );
        }

        Ok(report)
    }
}

/// The entries at the `kept` positions, in that order
pub fn select_kept<T: Clone>(items: &[T], kept: &[usize]) -> Vec<T> {
    kept.iter().filter_map(|&i| items.get(i).cloned()).collect()
}

/// Photo files present on disk, paired with their index metadata
pub fn collect_photos(restaurants: &[Restaurant]) -> (Vec<PathBuf>, Vec<ImageMetadata>) {
    let mut paths = Vec::new();
    let mut metadata = Vec::new();

    for restaurant in restaurants.iter().filter(|r| r.has_photos()) {
        for photo in &restaurant.photos {
            if photo.path.exists() {
                paths.push(photo.path.clone());
                metadata.push(ImageMetadata::from_photo(restaurant, photo));
            }
        }
    }

    (paths, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodfinder_core::Photo;
    use foodfinder_db::init_memory;
    use foodfinder_db::schema::TEXT_DIMENSION;
    use serde_json::json;
    use std::fs::File;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stats(text_count: usize, image_count: usize) -> IndexStats {
        IndexStats {
            text_count,
            image_count,
        }
    }

    #[test]
    fn test_plan_builds_missing_indices() {
        let plan = BuildPlan::decide(false, false, false, &stats(0, 0));
        assert!(plan.build_text && plan.build_image);
    }

    #[test]
    fn test_plan_keeps_existing_without_force() {
        let plan = BuildPlan::decide(false, false, false, &stats(10, 0));
        assert!(!plan.build_text);
        assert!(plan.build_image);

        let nothing = BuildPlan::decide(true, false, false, &stats(10, 4));
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_plan_force_and_only_flags() {
        let plan = BuildPlan::decide(false, true, true, &stats(10, 4));
        assert!(!plan.build_text);
        assert!(plan.build_image);
        assert!(plan.force);
    }

    #[test]
    fn test_collect_photos_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("p1.jpg");
        File::create(&present).unwrap();

        let photo = |id: &str, path: PathBuf| Photo {
            photo_id: id.into(),
            path,
            label: "food".into(),
            caption: String::new(),
        };
        let restaurants = vec![
            Restaurant::new("a", "A").with_photos(vec![
                photo("p1", present.clone()),
                photo("p2", dir.path().join("p2.jpg")),
            ]),
            Restaurant::new("b", "B"),
        ];

        let (paths, metadata) = collect_photos(&restaurants);

        assert_eq!(paths, vec![present]);
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].photo_id, "p1");
        assert_eq!(metadata[0].id, "a");
    }

    #[test]
    fn test_select_kept_skips_failed_images() {
        let metadata = vec!["p0", "p1", "p2", "p3", "p4"];

        assert_eq!(select_kept(&metadata, &[0, 2, 3]), vec!["p0", "p2", "p3"]);
        assert_eq!(select_kept(&metadata, &[4]), vec!["p4"]);
        assert!(select_kept(&metadata, &[]).is_empty());
    }

    async fn indexer(tei_url: &str) -> Indexer {
        Indexer::new(
            Repository::new(init_memory().await.unwrap()),
            TeiClient::new(tei_url),
            ClipEncoder::new(std::env::temp_dir()),
        )
    }

    #[tokio::test]
    async fn test_build_text_index_and_rebuild_metadata() {
        let server = MockServer::start().await;
        let vector = vec![0.1_f32; TEXT_DIMENSION];
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([vector.clone(), vector])),
            )
            .mount(&server)
            .await;

        let indexer = indexer(&server.uri()).await;
        let restaurants = vec![
            Restaurant::new("a", "Old A").with_categories("Pizza"),
            Restaurant::new("b", "Old B").with_categories("Tacos"),
        ];

        let plan = BuildPlan::decide(true, false, false, &stats(0, 0));
        let report = indexer
            .run(&plan, &restaurants, TextMode::Simple, None)
            .await
            .unwrap();
        assert_eq!(report.text, Some(2));
        assert_eq!(report.image, None);

        let renamed = vec![
            Restaurant::new("a", "New A"),
            Restaurant::new("zzz", "Not indexed"),
        ];
        let report = indexer.rebuild_metadata(&renamed, true, false).await.unwrap();

        assert_eq!(report.text_updated, 1);
        assert_eq!(report.text_missing, 1);
        assert_eq!(report.image_updated, 0);
    }

    #[tokio::test]
    async fn test_build_image_index_without_photos() {
        let indexer = indexer("http://127.0.0.1:9").await;
        let restaurants = vec![Restaurant::new("a", "A")];

        let report = indexer.build_image_index(&restaurants, None).await.unwrap();
        assert_eq!(report, None);
    }
}
