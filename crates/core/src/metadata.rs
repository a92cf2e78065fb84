//! Metadata stored alongside every indexed vector
//!
//! Search results are these records, serialised as JSON for the agent.

use crate::attributes::RestaurantAttributes;
use crate::restaurant::{Photo, Restaurant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata for one row of the text index (one per restaurant)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextMetadata {
    /// Yelp business id
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub is_open: i64,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,

    #[serde(flatten)]
    pub attributes: RestaurantAttributes,

    #[serde(default)]
    pub hours: BTreeMap<String, String>,
}

impl TextMetadata {
    pub fn from_restaurant(restaurant: &Restaurant) -> Self {
        Self {
            id: restaurant.business_id.clone(),
            name: restaurant.name.clone(),
            categories: restaurant.categories.clone(),
            rating: restaurant.stars,
            review_count: restaurant.review_count,
            is_open: restaurant.is_open,
            latitude: restaurant.latitude,
            longitude: restaurant.longitude,
            address: restaurant.address.clone(),
            city: restaurant.city.clone(),
            state: restaurant.state.clone(),
            postal_code: restaurant.postal_code.clone(),
            attributes: RestaurantAttributes::from_map(&restaurant.attributes),
            hours: restaurant.hours.clone(),
        }
    }
}

/// Metadata for one row of the image index (one per photo)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageMetadata {
    /// Yelp business id of the restaurant owning the photo
    pub id: String,
    pub name: String,
    pub photo_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub is_open: i64,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,

    #[serde(flatten)]
    pub attributes: RestaurantAttributes,

    #[serde(default)]
    pub hours: BTreeMap<String, String>,
}

impl ImageMetadata {
    pub fn from_photo(restaurant: &Restaurant, photo: &Photo) -> Self {
        Self {
            id: restaurant.business_id.clone(),
            name: restaurant.name.clone(),
            photo_id: photo.photo_id.clone(),
            label: photo.label.clone(),
            categories: restaurant.categories.clone(),
            rating: restaurant.stars,
            review_count: restaurant.review_count,
            is_open: restaurant.is_open,
            latitude: restaurant.latitude,
            longitude: restaurant.longitude,
            address: restaurant.address.clone(),
            city: restaurant.city.clone(),
            state: restaurant.state.clone(),
            attributes: RestaurantAttributes::from_map(&restaurant.attributes),
            hours: restaurant.hours.clone(),
        }
    }
}
