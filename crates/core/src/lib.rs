//! Core domain types for FoodFinder
//!
//! This crate defines the restaurant records produced from the Yelp
//! dataset, the metadata stored next to every indexed vector, and the
//! text renderings that get embedded.

pub mod attributes;
pub mod dataset;
pub mod error;
pub mod metadata;
pub mod restaurant;
pub mod text;

pub use attributes::RestaurantAttributes;
pub use dataset::DatasetStats;
pub use error::{CoreError, Result};
pub use metadata::{ImageMetadata, TextMetadata};
pub use restaurant::{Photo, RawBusiness, RawPhoto, Restaurant};
pub use text::TextMode;
