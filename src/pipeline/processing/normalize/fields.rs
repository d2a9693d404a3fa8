//! Scalar field parsers. All of them are total: malformed input yields `None`.

use crate::config::CoordinateBounds;
use crate::constants::{LAB_CODE_SENTINELS, MIN_LAB_CODE_LEN, MISSING_SENTINELS};
use crate::types::Coordinates;

pub fn parse_float(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if MISSING_SENTINELS.contains(&trimmed) {
        return None;
    }
    let cleaned = trimmed.replace(',', "");
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Parses a number and truncates it toward zero.
pub fn parse_int(value: &str) -> Option<i64> {
    parse_float(value).map(|f| f.trunc() as i64)
}

/// Outcome of checking a raw latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateCheck {
    Valid(Coordinates),
    /// At least one side was missing or unparseable.
    Missing,
    /// Both parsed but fell outside the configured bounds.
    OutOfBounds { latitude: f64, longitude: f64 },
}

impl CoordinateCheck {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            CoordinateCheck::Valid(c) => Some(*c),
            _ => None,
        }
    }
}

/// Parses a coordinate pair and, when `bounds` is given, checks it against them.
pub fn check_coordinates(lat: &str, lon: &str, bounds: Option<&CoordinateBounds>) -> CoordinateCheck {
    let (Some(latitude), Some(longitude)) = (parse_float(lat), parse_float(lon)) else {
        return CoordinateCheck::Missing;
    };
    match bounds {
        Some(b) if !b.contains(latitude, longitude) => CoordinateCheck::OutOfBounds { latitude, longitude },
        _ => CoordinateCheck::Valid(Coordinates::new(latitude, longitude)),
    }
}

/// Top depth in centimetres. Ranges such as `10-20` keep the first bound.
pub fn parse_depth(value: &str) -> Option<f64> {
    let trimmed = value.trim().to_lowercase();
    if trimmed == "surface" || MISSING_SENTINELS.contains(&trimmed.as_str()) {
        return None;
    }

    if let Some((top, _bottom)) = trimmed.split_once('-') {
        if let Some(top) = parse_float(top) {
            return Some(top);
        }
    }

    parse_float(&trimmed)
}

/// Canonical laboratory code: upper-cased with all whitespace removed.
pub fn parse_lab_code(value: &str) -> Option<String> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if cleaned.chars().count() < MIN_LAB_CODE_LEN || LAB_CODE_SENTINELS.contains(&cleaned.as_str()) {
        return None;
    }
    Some(cleaned)
}

/// Key used for site name identity: lower-case with whitespace removed.
pub fn site_name_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Trims a free-text value, mapping blank to `None`.
pub fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
