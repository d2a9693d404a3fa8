//! Field normalization: raw text columns into typed, canonical values.
//!
//! Nothing in here touches the store. [`NormalizedRecord::from_raw`] runs
//! every normalizer over one input row so the record processor only has to
//! resolve and persist.

pub mod citation;
pub mod classify;
pub mod fields;

pub use citation::parse_citation;
pub use classify::{derive_state_from_region, determine_method, normalize_material, normalize_state};
pub use fields::{
    check_coordinates, non_blank, parse_depth, parse_float, parse_int, parse_lab_code,
    site_name_key, CoordinateCheck,
};

use crate::config::Config;
use crate::constants::{columns, DEFAULT_SITE_NAME};
use crate::types::{Coordinates, MaterialCode, MethodCode, RawRecord, SiteArgs};

/// One input row after normalization, before any store lookups.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    /// `None` means the row carries no usable laboratory code and is skipped.
    pub lab_code: Option<String>,
    pub site: SiteArgs,
    pub material_code: MaterialCode,
    pub material_description: String,
    pub depth_cm_top: Option<f64>,
    pub context: String,
    pub method: MethodCode,
    pub age: Option<i64>,
    pub age_error: Option<i64>,
    pub delta_c13: Option<f64>,
    pub delta_c13_error: Option<f64>,
    pub citation: Option<String>,
    pub is_rejected: bool,
    pub rejection_reason: Option<String>,
    pub quality_issues: Option<Vec<String>>,
    pub notes: String,
    /// Row-level warnings, e.g. discarded coordinates.
    pub warnings: Vec<String>,
}

impl NormalizedRecord {
    pub fn from_raw(raw: &RawRecord, config: &Config) -> Self {
        let mut warnings = Vec::new();

        let bounds = config.validate_coordinates.then_some(&config.bounds);
        let coordinates: Option<Coordinates> =
            match check_coordinates(raw.get(columns::LATITUDE), raw.get(columns::LONGITUDE), bounds) {
                CoordinateCheck::Valid(c) => Some(c),
                CoordinateCheck::Missing => None,
                CoordinateCheck::OutOfBounds { latitude, longitude } => {
                    warnings.push(format!("Invalid coordinates: {latitude}, {longitude}"));
                    None
                }
            };

        let lab_code = parse_lab_code(raw.get(columns::LAB_CODE));

        let region = raw.get(columns::IBRA_REGION).trim().to_string();
        let state = normalize_state(raw.get(columns::STATE))
            .or_else(|| derive_state_from_region(&region));
        let site = SiteArgs {
            name: non_blank(raw.get(columns::SITE)).unwrap_or_else(|| DEFAULT_SITE_NAME.to_string()),
            coordinates,
            state,
            site_type: raw.get(columns::SITE_TYPE).trim().to_string(),
            region,
        };

        // the detailed description is what gets stored; the top-level column
        // only helps classification
        let material_description = raw.get(columns::MATERIAL).trim().to_string();
        let material_source = if material_description.is_empty() {
            raw.get(columns::MATERIAL_TOP_LEVEL)
        } else {
            material_description.as_str()
        };
        let material_code = normalize_material(material_source);

        let method = determine_method(
            raw.get(columns::METHOD),
            raw.get(columns::TECHNIQUE),
            lab_code.as_deref().unwrap_or(""),
        );

        let date_issues = raw.get(columns::DATE_ISSUES).trim();
        let additional_issues = raw.get(columns::ADDITIONAL_DATA_ISSUES).trim();
        let notes = raw.get(columns::NOTES).trim().to_string();

        let is_rejected = !date_issues.is_empty() || notes.to_lowercase().contains("reject");
        let rejection_reason = non_blank(date_issues).filter(|_| is_rejected);

        let issues: Vec<String> = [date_issues, additional_issues]
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            lab_code,
            site,
            material_code,
            material_description,
            depth_cm_top: parse_depth(raw.get(columns::DEPTH)),
            context: raw.get(columns::CONTEXT).trim().to_string(),
            method,
            age: parse_int(raw.get(columns::AGE)),
            age_error: parse_int(raw.get(columns::ERROR)),
            delta_c13: parse_float(raw.get(columns::C13_AGE)),
            delta_c13_error: parse_float(raw.get(columns::C13_ERROR)),
            citation: non_blank(raw.get(columns::SOURCE)),
            is_rejected,
            rejection_reason,
            quality_issues: (!issues.is_empty()).then_some(issues),
            notes,
            warnings,
        }
    }

    /// Conventional/AMS age columns, populated for radiocarbon methods only.
    pub fn radiocarbon_age(&self) -> (Option<i64>, Option<i64>) {
        if self.method.is_radiocarbon() {
            (self.age, self.age_error)
        } else {
            (None, None)
        }
    }

    /// Luminescence age and error converted from years to ka.
    pub fn luminescence_age_ka(&self) -> (Option<f64>, Option<f64>) {
        if !self.method.is_luminescence() {
            return (None, None);
        }
        let to_ka = |years: i64| years as f64 / 1000.0;
        (self.age.map(to_ka), self.age_error.map(to_ka))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RawRecord {
        RawRecord::new()
            .with(columns::SITE, "Devil's Lair")
            .with(columns::IBRA_REGION, "Warren")
            .with(columns::LATITUDE, "-34.15")
            .with(columns::LONGITUDE, "115.07")
            .with(columns::MATERIAL, "burnt bone")
            .with(columns::DEPTH, "120-130")
            .with(columns::METHOD, "Radiocarbon")
            .with(columns::TECHNIQUE, "AMS")
            .with(columns::LAB_CODE, "oza 123")
            .with(columns::AGE, "31,500")
            .with(columns::ERROR, "450")
    }

    #[test]
    fn test_normalize_full_row() {
        let n = NormalizedRecord::from_raw(&record(), &Config::default());

        assert_eq!(n.lab_code.as_deref(), Some("OZA123"));
        assert_eq!(n.site.name, "Devil's Lair");
        assert_eq!(n.site.coordinates, Some(Coordinates::new(-34.15, 115.07)));
        assert_eq!(n.material_code, MaterialCode::BoneBurnt);
        assert_eq!(n.depth_cm_top, Some(120.0));
        assert_eq!(n.method, MethodCode::Ams);
        assert_eq!(n.radiocarbon_age(), (Some(31500), Some(450)));
        assert_eq!(n.luminescence_age_ka(), (None, None));
        assert!(!n.is_rejected);
        assert_eq!(n.quality_issues, None);
        assert!(n.warnings.is_empty());
    }

    #[test]
    fn test_out_of_bounds_coordinates_warn() {
        let raw = record()
            .with(columns::LATITUDE, "52.0")
            .with(columns::LONGITUDE, "10.0");
        let n = NormalizedRecord::from_raw(&raw, &Config::default());

        assert_eq!(n.site.coordinates, None);
        assert_eq!(n.warnings, vec!["Invalid coordinates: 52, 10".to_string()]);
        assert!(n.lab_code.is_some());
    }

    #[test]
    fn test_coordinate_validation_disabled() {
        let raw = record()
            .with(columns::LATITUDE, "52.0")
            .with(columns::LONGITUDE, "10.0");
        let config = Config {
            validate_coordinates: false,
            ..Config::default()
        };
        let n = NormalizedRecord::from_raw(&raw, &config);
        assert_eq!(n.site.coordinates, Some(Coordinates::new(52.0, 10.0)));
        assert!(n.warnings.is_empty());
    }

    #[test]
    fn test_luminescence_converted_to_ka() {
        let raw = record()
            .with(columns::METHOD, "OSL")
            .with(columns::TECHNIQUE, "")
            .with(columns::AGE, "45000")
            .with(columns::ERROR, "2500");
        let n = NormalizedRecord::from_raw(&raw, &Config::default());

        assert_eq!(n.method, MethodCode::Osl);
        assert_eq!(n.luminescence_age_ka(), (Some(45.0), Some(2.5)));
        assert_eq!(n.radiocarbon_age(), (None, None));
        assert_eq!(n.age, Some(45000));
    }

    #[test]
    fn test_rejection_and_quality_issues() {
        let raw = record()
            .with(columns::DATE_ISSUES, " contaminated ")
            .with(columns::ADDITIONAL_DATA_ISSUES, "location approximate");
        let n = NormalizedRecord::from_raw(&raw, &Config::default());

        assert!(n.is_rejected);
        assert_eq!(n.rejection_reason.as_deref(), Some("contaminated"));
        assert_eq!(
            n.quality_issues,
            Some(vec!["contaminated".to_string(), "location approximate".to_string()])
        );
    }

    #[test]
    fn test_rejected_by_notes_keyword() {
        let raw = record().with(columns::NOTES, "Authors REJECTED this date");
        let n = NormalizedRecord::from_raw(&raw, &Config::default());

        assert!(n.is_rejected);
        assert_eq!(n.rejection_reason, None);
        assert_eq!(n.quality_issues, None);
    }

    #[test]
    fn test_missing_site_and_material_fallback() {
        let raw = RawRecord::new()
            .with(columns::LAB_CODE, "Wk-1")
            .with(columns::MATERIAL_TOP_LEVEL, "Charcoal");
        let n = NormalizedRecord::from_raw(&raw, &Config::default());

        assert_eq!(n.site.name, DEFAULT_SITE_NAME);
        assert_eq!(n.material_code, MaterialCode::Charcoal);
        assert_eq!(n.material_description, "");
        assert_eq!(n.site.state, None);
    }

    #[test]
    fn test_state_column_preferred_over_region() {
        let raw = record()
            .with(columns::STATE, "Western Australia")
            .with(columns::IBRA_REGION, "Sydney Basin");
        let n = NormalizedRecord::from_raw(&raw, &Config::default());
        assert_eq!(n.site.state.as_deref(), Some("WA"));

        let raw = record().with(columns::IBRA_REGION, "Sydney Basin");
        let n = NormalizedRecord::from_raw(&raw, &Config::default());
        assert_eq!(n.site.state.as_deref(), Some("NSW"));
    }
}
