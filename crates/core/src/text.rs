//! Text renderings of restaurants that are fed to the text embedder

use crate::attributes::{clean_string, is_true, parse_price, python_dict};
use crate::restaurant::Restaurant;
use serde_json::Value;

/// Which rendering the text index is built from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextMode {
    /// `"{name}. {categories}."`
    #[default]
    Simple,
    /// Name, cuisine, location, rating, price, features, meals and ambiance
    Rich,
}

impl TextMode {
    pub fn render(self, restaurant: &Restaurant) -> String {
        match self {
            TextMode::Simple => embedding_text(restaurant),
            TextMode::Rich => rich_text(restaurant),
        }
    }
}

/// The short text embedded by default
pub fn embedding_text(restaurant: &Restaurant) -> String {
    format!("{}. {}.", restaurant.name, restaurant.categories)
}

/// A comprehensive description used for better semantic matching
pub fn rich_text(restaurant: &Restaurant) -> String {
    let attributes = &restaurant.attributes;
    let mut parts = vec![format!("Restaurant: {}", restaurant.name)];

    if !restaurant.categories.is_empty() {
        parts.push(format!("Cuisine: {}", restaurant.categories));
    }

    let location: Vec<&str> = [&restaurant.address, &restaurant.city, &restaurant.state]
        .into_iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    if !location.is_empty() {
        parts.push(format!("Location: {}", location.join(", ")));
    }

    if restaurant.stars > 0.0 {
        parts.push(format!("Rating: {} stars", format_stars(restaurant.stars)));
    }
    if restaurant.review_count > 0 {
        parts.push(format!("{} reviews", restaurant.review_count));
    }

    if let Some(level) = parse_price(attributes.get("RestaurantsPriceRange2")) {
        parts.push(format!("Price: {}", dollars(level)));
    }

    let mut features = Vec::new();
    let flags = [
        ("OutdoorSeating", "outdoor seating"),
        ("GoodForKids", "kid-friendly"),
        ("RestaurantsReservations", "accepts reservations"),
        ("RestaurantsDelivery", "delivery available"),
        ("RestaurantsTakeOut", "takeout available"),
    ];
    for (key, label) in flags {
        if is_true(attributes.get(key)) {
            features.push(label);
        }
    }
    if let Some(wifi) = clean_string(attributes.get("WiFi")) {
        if !wifi.is_empty() && wifi != "no" {
            features.push("has WiFi");
        }
    }
    if let Some(alcohol) = clean_string(attributes.get("Alcohol")) {
        if !alcohol.is_empty() && alcohol != "none" {
            features.push("serves alcohol");
        }
    }
    if !features.is_empty() {
        parts.push(format!("Features: {}", features.join(", ")));
    }

    let meals = true_keys(attributes.get("GoodForMeal"));
    if !meals.is_empty() {
        parts.push(format!("Good for: {}", meals.join(", ")));
    }

    let ambience = true_keys(attributes.get("Ambience"));
    if !ambience.is_empty() {
        parts.push(format!("Ambiance: {}", ambience.join(", ")));
    }

    format!("{}.", parts.join(". "))
}

/// Price range as dollar signs, or `Unknown`
pub fn price_text(restaurant: &Restaurant) -> String {
    match parse_price(restaurant.attributes.get("RestaurantsPriceRange2")) {
        Some(level) => dollars(level),
        None => "Unknown".to_string(),
    }
}

fn dollars(level: i64) -> String {
    "$".repeat(level as usize)
}

fn format_stars(stars: f32) -> String {
    if stars.fract() == 0.0 {
        format!("{:.1}", stars)
    } else {
        stars.to_string()
    }
}

/// Lower-cased keys whose value is true, from a dict or a dict literal
fn true_keys(value: Option<&Value>) -> Vec<String> {
    let map = match value {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => match python_dict(s) {
            Some(map) => map,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    map.iter()
        .filter(|(_, v)| is_true(Some(v)))
        .map(|(k, _)| k.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedding_text() {
        let r = Restaurant::new("b1", "Sushi Zen").with_categories("Sushi Bars, Japanese");
        assert_eq!(embedding_text(&r), "Sushi Zen. Sushi Bars, Japanese.");
    }

    #[test]
    fn test_rich_text_full() {
        let r = Restaurant::new("b1", "Sushi Zen")
            .with_categories("Japanese")
            .with_location("12 Elm St", "Tampa", "FL")
            .with_rating(4.0, 87)
            .with_attribute("RestaurantsPriceRange2", json!("2"))
            .with_attribute("OutdoorSeating", json!("True"))
            .with_attribute("WiFi", json!("u'free'"))
            .with_attribute("Alcohol", json!("u'none'"))
            .with_attribute("GoodForMeal", json!("{'dinner': True, 'lunch': False}"))
            .with_attribute("Ambience", json!({"casual": true, "romantic": false}));

        assert_eq!(
            rich_text(&r),
            "Restaurant: Sushi Zen. Cuisine: Japanese. Location: 12 Elm St, Tampa, FL. \
             Rating: 4.0 stars. 87 reviews. Price: $$. Features: outdoor seating, has WiFi. \
             Good for: dinner. Ambiance: casual."
        );
    }

    #[test]
    fn test_rich_text_minimal() {
        let r = Restaurant::new("b1", "Nameless");
        assert_eq!(rich_text(&r), "Restaurant: Nameless.");
    }

    #[test]
    fn test_price_text() {
        let priced = Restaurant::new("b1", "A").with_attribute("RestaurantsPriceRange2", json!("3"));
        let unpriced = Restaurant::new("b2", "B");

        assert_eq!(price_text(&priced), "$$$");
        assert_eq!(price_text(&unpriced), "Unknown");

        let corrupt =
            Restaurant::new("b3", "C").with_attribute("RestaurantsPriceRange2", json!("99999999999"));
        assert_eq!(price_text(&corrupt), "Unknown");
    }

    #[test]
    fn test_text_mode_render() {
        let r = Restaurant::new("b1", "Cafe").with_categories("Coffee & Tea");
        assert_eq!(TextMode::Simple.render(&r), "Cafe. Coffee & Tea.");
        assert!(TextMode::Rich.render(&r).starts_with("Restaurant: Cafe."));
    }
}
