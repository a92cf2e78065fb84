//! Restaurant records - raw Yelp rows and the processed form

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single line of `yelp_academic_dataset_business.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBusiness {
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub stars: Option<f32>,
    #[serde(default)]
    pub review_count: Option<u32>,
    #[serde(default)]
    pub is_open: Option<i64>,
    #[serde(default)]
    pub categories: Option<String>,
    /// Yelp attributes; values are mostly Python-literal strings
    #[serde(default)]
    pub attributes: Option<Value>,
    #[serde(default)]
    pub hours: Option<BTreeMap<String, String>>,
}

impl RawBusiness {
    /// Whether the business is flagged as currently open
    pub fn is_open(&self) -> bool {
        self.is_open == Some(1)
    }
}

/// A single line of `photos.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPhoto {
    pub photo_id: String,
    pub business_id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// A photo attached to a processed restaurant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Photo {
    pub photo_id: String,
    /// Location of the JPEG on disk
    pub path: PathBuf,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub caption: String,
}

/// A processed restaurant, as stored in `restaurants.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub stars: f32,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub is_open: i64,
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub hours: BTreeMap<String, String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

impl Restaurant {
    /// Create a restaurant with only the identifying fields set
    pub fn new(business_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            business_id: business_id.into(),
            name: name.into(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            latitude: None,
            longitude: None,
            stars: 0.0,
            review_count: 0,
            is_open: 1,
            categories: String::new(),
            attributes: Map::new(),
            hours: BTreeMap::new(),
            photos: Vec::new(),
        }
    }

    /// Build the processed record from a raw business row
    pub fn from_business(business: RawBusiness, photos: Vec<Photo>) -> Self {
        let attributes = match business.attributes {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Self {
            business_id: business.business_id,
            name: business.name,
            address: business.address.unwrap_or_default(),
            city: business.city.unwrap_or_default(),
            state: business.state.unwrap_or_default(),
            postal_code: business.postal_code.unwrap_or_default(),
            latitude: business.latitude,
            longitude: business.longitude,
            stars: business.stars.unwrap_or(0.0),
            review_count: business.review_count.unwrap_or(0),
            is_open: business.is_open.unwrap_or(0),
            categories: business.categories.unwrap_or_default(),
            attributes,
            hours: business.hours.unwrap_or_default(),
            photos,
        }
    }

    /// Builder: set categories
    pub fn with_categories(mut self, categories: impl Into<String>) -> Self {
        self.categories = categories.into();
        self
    }

    /// Builder: set location
    pub fn with_location(
        mut self,
        address: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        self.address = address.into();
        self.city = city.into();
        self.state = state.into();
        self
    }

    /// Builder: set rating and review count
    pub fn with_rating(mut self, stars: f32, review_count: u32) -> Self {
        self.stars = stars;
        self.review_count = review_count;
        self
    }

    /// Builder: set a single attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Builder: attach photos
    pub fn with_photos(mut self, photos: Vec<Photo>) -> Self {
        self.photos = photos;
        self
    }

    pub fn has_photos(&self) -> bool {
        !self.photos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_business_fills_defaults() {
        let raw: RawBusiness = serde_json::from_value(json!({
            "business_id": "b1",
            "name": "Luigi's",
            "attributes": null,
            "hours": null,
            "is_open": 1
        }))
        .unwrap();

        let restaurant = Restaurant::from_business(raw, Vec::new());

        assert_eq!(restaurant.business_id, "b1");
        assert_eq!(restaurant.address, "");
        assert_eq!(restaurant.stars, 0.0);
        assert_eq!(restaurant.review_count, 0);
        assert_eq!(restaurant.is_open, 1);
        assert!(restaurant.attributes.is_empty());
        assert!(restaurant.hours.is_empty());
        assert!(!restaurant.has_photos());
    }

    #[test]
    fn test_processed_record_reads_without_optional_fields() {
        let restaurant: Restaurant =
            serde_json::from_str(r#"{"business_id": "b2", "name": "Taqueria"}"#).unwrap();

        assert_eq!(restaurant.name, "Taqueria");
        assert!(restaurant.photos.is_empty());
        assert_eq!(restaurant.is_open, 0);
    }
}
