//! Yelp dataset processing: load, filter, attach photos, persist, sample

use crate::error::{CoreError, Result};
use crate::restaurant::{Photo, RawBusiness, RawPhoto, Restaurant};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use tracing::{info, warn};

/// Category keywords that mark a business as a food place
pub const RESTAURANT_KEYWORDS: &[&str] = &[
    "restaurant", "food", "cafe", "bar", "pizza", "burger",
    "sushi", "mexican", "italian", "chinese", "japanese",
    "thai", "indian", "korean", "vietnamese", "american",
    "breakfast", "brunch", "lunch", "dinner", "bakery",
    "coffee", "tea", "sandwiches", "deli", "grill",
];

/// Load the business file (one JSON object per line)
pub fn load_businesses(path: impl AsRef<Path>) -> Result<Vec<RawBusiness>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CoreError::DatasetNotFound(path.display().to_string()));
    }
    let businesses: Vec<RawBusiness> = read_json_lines(path)?;
    info!("Loaded {} businesses from {}", businesses.len(), path.display());
    Ok(businesses)
}

/// Load the photo file; a missing file yields no photos
pub fn load_photos(path: impl AsRef<Path>) -> Result<Vec<RawPhoto>> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("Photos file not found: {}", path.display());
        return Ok(Vec::new());
    }
    let photos: Vec<RawPhoto> = read_json_lines(path)?;
    info!("Loaded {} photos from {}", photos.len(), path.display());
    Ok(photos)
}

fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| CoreError::InvalidRecord {
            line: index + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Whether a category string names a food business
pub fn is_restaurant_category(categories: &str) -> bool {
    let lowered = categories.to_lowercase();
    RESTAURANT_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Keep open businesses whose categories mention a restaurant keyword
pub fn filter_restaurants(businesses: Vec<RawBusiness>) -> Vec<RawBusiness> {
    businesses
        .into_iter()
        .filter(|b| {
            b.categories
                .as_deref()
                .map(|c| !c.is_empty() && is_restaurant_category(c))
                .unwrap_or(false)
        })
        .filter(RawBusiness::is_open)
        .collect()
}

/// Group photos by business, keeping only those whose JPEG is on disk
pub fn map_photos(photos: &[RawPhoto], photo_dir: &Path) -> HashMap<String, Vec<Photo>> {
    let mut mapping: HashMap<String, Vec<Photo>> = HashMap::new();

    for photo in photos {
        let path = photo_dir.join(format!("{}.jpg", photo.photo_id));
        if !path.exists() {
            continue;
        }
        mapping
            .entry(photo.business_id.clone())
            .or_default()
            .push(Photo {
                photo_id: photo.photo_id.clone(),
                path,
                label: photo.label.clone().unwrap_or_default(),
                caption: photo.caption.clone().unwrap_or_default(),
            });
    }

    mapping
}

/// Turn filtered businesses into processed restaurants with their photos
pub fn process_restaurants(
    businesses: Vec<RawBusiness>,
    mut photos: HashMap<String, Vec<Photo>>,
) -> Vec<Restaurant> {
    businesses
        .into_iter()
        .map(|business| {
            let attached = photos.remove(&business.business_id).unwrap_or_default();
            Restaurant::from_business(business, attached)
        })
        .collect()
}

/// Write restaurants as a pretty-printed JSON array
pub fn save_restaurants(path: impl AsRef<Path>, restaurants: &[Restaurant]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, restaurants)?;
    info!("Saved {} restaurants to {}", restaurants.len(), path.display());
    Ok(())
}

/// Read a processed `restaurants.json`
pub fn load_restaurants(path: impl AsRef<Path>) -> Result<Vec<Restaurant>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CoreError::DatasetNotFound(path.display().to_string()));
    }
    let reader = BufReader::new(File::open(path)?);
    let restaurants: Vec<Restaurant> = serde_json::from_reader(reader)?;
    Ok(restaurants)
}

/// Uniform sample without replacement of `min(size, len)` restaurants
pub fn sample_restaurants<R: Rng + ?Sized>(
    restaurants: &[Restaurant],
    size: usize,
    rng: &mut R,
) -> Vec<Restaurant> {
    restaurants
        .choose_multiple(rng, size.min(restaurants.len()))
        .cloned()
        .collect()
}

/// Summary numbers printed after processing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetStats {
    pub total: usize,
    pub with_photos: usize,
    pub average_rating: f32,
}

impl DatasetStats {
    pub fn from_restaurants(restaurants: &[Restaurant]) -> Self {
        let total = restaurants.len();
        let with_photos = restaurants.iter().filter(|r| r.has_photos()).count();
        let average_rating = if total == 0 {
            0.0
        } else {
            restaurants.iter().map(|r| r.stars).sum::<f32>() / total as f32
        };
        Self {
            total,
            with_photos,
            average_rating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    fn business(id: &str, categories: Option<&str>, is_open: i64) -> RawBusiness {
        RawBusiness {
            business_id: id.into(),
            name: format!("Business {}", id),
            address: None,
            city: None,
            state: None,
            postal_code: None,
            latitude: None,
            longitude: None,
            stars: Some(4.0),
            review_count: Some(10),
            is_open: Some(is_open),
            categories: categories.map(String::from),
            attributes: None,
            hours: None,
        }
    }

    #[test]
    fn test_filter_restaurants() {
        let businesses = vec![
            business("a", Some("Pizza, Italian"), 1),
            business("b", Some("Auto Repair"), 1),
            business("c", Some("Coffee & Tea"), 0),
            business("d", None, 1),
            business("e", Some(""), 1),
            business("f", Some("Nightlife, Bars"), 1),
        ];

        let kept: Vec<String> = filter_restaurants(businesses)
            .into_iter()
            .map(|b| b.business_id)
            .collect();

        assert_eq!(kept, vec!["a".to_string(), "f".to_string()]);
    }

    #[test]
    fn test_map_photos_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("p1.jpg")).unwrap();

        let photos = vec![
            RawPhoto {
                photo_id: "p1".into(),
                business_id: "a".into(),
                label: Some("food".into()),
                caption: None,
            },
            RawPhoto {
                photo_id: "p2".into(),
                business_id: "a".into(),
                label: None,
                caption: None,
            },
        ];

        let mapping = map_photos(&photos, dir.path());
        let attached = &mapping["a"];

        assert_eq!(attached.len(), 1);
        assert_eq!(attached[0].photo_id, "p1");
        assert_eq!(attached[0].label, "food");
        assert_eq!(attached[0].path, dir.path().join("p1.jpg"));
    }

    #[test]
    fn test_process_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("processed").join("restaurants.json");

        let restaurants = process_restaurants(
            vec![business("a", Some("Pizza"), 1)],
            HashMap::new(),
        );
        save_restaurants(&out, &restaurants).unwrap();
        let loaded = load_restaurants(&out).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].business_id, "a");
        assert_eq!(loaded[0].categories, "Pizza");
    }

    #[test]
    fn test_load_businesses_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("business.json");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"business_id": "a", "name": "A"}}"#).unwrap();
        writeln!(file, "not json").unwrap();

        match load_businesses(&path) {
            Err(CoreError::InvalidRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_missing_photos_file_is_empty() {
        let photos = load_photos("/definitely/not/here/photos.json").unwrap();
        assert!(photos.is_empty());
    }

    #[test]
    fn test_sample_restaurants() {
        let restaurants: Vec<Restaurant> = (0..10)
            .map(|i| Restaurant::new(format!("b{}", i), "R"))
            .collect();
        let mut rng = StdRng::seed_from_u64(7);

        let sample = sample_restaurants(&restaurants, 4, &mut rng);
        assert_eq!(sample.len(), 4);

        let mut ids: Vec<&str> = sample.iter().map(|r| r.business_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);

        let everything = sample_restaurants(&restaurants, 50, &mut rng);
        assert_eq!(everything.len(), 10);
    }

    #[test]
    fn test_dataset_stats() {
        let restaurants = vec![
            Restaurant::new("a", "A").with_rating(4.0, 1),
            Restaurant::new("b", "B").with_rating(3.0, 1),
        ];
        let stats = DatasetStats::from_restaurants(&restaurants);

        assert_eq!(stats.total, 2);
        assert_eq!(stats.with_photos, 0);
        assert!((stats.average_rating - 3.5).abs() < f32::EPSILON);
        assert_eq!(DatasetStats::from_restaurants(&[]).average_rating, 0.0);
    }
}
