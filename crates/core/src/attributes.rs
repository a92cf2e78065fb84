//! Normalisation of Yelp business attributes
//!
//! Yelp ships attribute values as Python literals serialised into strings
//! (`"True"`, `"u'free'"`, `"{'garage': False}"`). These helpers turn them
//! into typed values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Characters stripped from both ends of attribute strings
const QUOTE_CHARS: &[char] = &['\'', '"', 'u', ' '];

/// Yelp price levels, `$` to `$$$$`
const PRICE_LEVELS: std::ops::RangeInclusive<i64> = 1..=4;

/// Typed view of the attributes the index metadata carries
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RestaurantAttributes {
    pub price_range: Option<i64>,
    pub takes_reservations: Option<bool>,
    pub delivery: Option<bool>,
    pub takeout: Option<bool>,
    pub outdoor_seating: Option<bool>,
    pub good_for_kids: Option<bool>,
    pub wifi: Option<String>,
    pub alcohol: Option<String>,
    pub parking: Option<Value>,
    pub wheelchair_accessible: Option<bool>,
    pub caters: Option<bool>,
    pub has_tv: Option<bool>,
    pub noise_level: Option<String>,
    pub attire: Option<String>,
    pub good_for_groups: Option<bool>,
}

impl RestaurantAttributes {
    /// Extract and normalise attributes from the raw Yelp map
    pub fn from_map(attrs: &Map<String, Value>) -> Self {
        Self {
            price_range: parse_price(attrs.get("RestaurantsPriceRange2")),
            takes_reservations: parse_bool(attrs.get("RestaurantsReservations")),
            delivery: parse_bool(attrs.get("RestaurantsDelivery")),
            takeout: parse_bool(attrs.get("RestaurantsTakeOut")),
            outdoor_seating: parse_bool(attrs.get("OutdoorSeating")),
            good_for_kids: parse_bool(attrs.get("GoodForKids")),
            wifi: clean_string(attrs.get("WiFi")),
            alcohol: clean_string(attrs.get("Alcohol")),
            parking: parse_parking(attrs.get("BusinessParking")),
            wheelchair_accessible: parse_bool(attrs.get("WheelchairAccessible")),
            caters: parse_bool(attrs.get("Caters")),
            has_tv: parse_bool(attrs.get("HasTV")),
            noise_level: clean_string(attrs.get("NoiseLevel")),
            attire: clean_string(attrs.get("RestaurantsAttire")),
            good_for_groups: parse_bool(attrs.get("RestaurantsGoodForGroups")),
        }
    }
}

/// Parse a boolean attribute, accepting JSON booleans and Python-literal strings
pub fn parse_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let lowered = s.to_lowercase();
            match lowered.trim_matches(QUOTE_CHARS) {
                "true" | "1" => Some(true),
                "false" | "0" | "none" => Some(false),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Parse the `RestaurantsPriceRange2` level; values outside 1..=4 are dropped
pub fn parse_price(value: Option<&Value>) -> Option<i64> {
    let level = match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    PRICE_LEVELS.contains(&level).then_some(level)
}

/// Parse `BusinessParking`, which is usually a Python dict literal
pub fn parse_parking(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::Object(map) => Some(Value::Object(map.clone())),
        Value::String(s) => python_dict(s).map(Value::Object),
        _ => None,
    }
}

/// Strip Python string decoration (`u'...'`, quotes) from a value
pub fn clean_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.trim_matches(QUOTE_CHARS).to_string()),
        other => Some(other.to_string()),
    }
}

/// Whether a raw attribute is `True` (string or boolean)
pub fn is_true(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
        || matches!(value, Some(Value::String(s)) if s == "True")
}

/// Parse a Python dict literal such as `{'garage': False, 'lot': True}`
pub(crate) fn python_dict(literal: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(&python_literal_to_json(literal)) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn python_literal_to_json(literal: &str) -> String {
    literal
        .replace("u'", "'")
        .replace('\'', "\"")
        .replace("True", "true")
        .replace("False", "false")
        .replace("None", "null")
}
