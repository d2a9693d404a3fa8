//! Vocabulary classification over ordered fragment tables.

use crate::constants::{
    AMS_LAB_PREFIXES, BIOREGION_STATE_HINTS, CONVENTIONAL_LAB_PREFIXES, LUMINESCENCE_KEYWORDS,
    MATERIAL_FRAGMENTS, OTHER_TECHNIQUE_KEYWORDS, RADIOCARBON_KEYWORDS, STATE_NAMES,
};
use crate::types::{MaterialCode, MethodCode};

fn first_fragment<T: Copy>(text: &str, table: &[(&str, T)]) -> Option<T> {
    table
        .iter()
        .find(|(fragment, _)| text.contains(fragment))
        .map(|(_, code)| *code)
}

pub fn normalize_material(description: &str) -> MaterialCode {
    let lower = description.trim().to_lowercase();
    if lower.is_empty() {
        return MaterialCode::Unknown;
    }
    first_fragment(&lower, MATERIAL_FRAGMENTS).unwrap_or(MaterialCode::Other)
}

/// Classifies the dating method.
///
/// Text tiers run before the lab-code heuristic so a luminescence date from a
/// lab that also runs AMS is never filed as radiocarbon.
pub fn determine_method(method: &str, technique: &str, lab_code: &str) -> MethodCode {
    let combined = format!("{method} {technique}").to_lowercase();

    for tier in [LUMINESCENCE_KEYWORDS, OTHER_TECHNIQUE_KEYWORDS, RADIOCARBON_KEYWORDS] {
        if let Some(code) = first_fragment(&combined, tier) {
            return code;
        }
    }

    let lab = lab_code.trim().to_uppercase();
    if !lab.is_empty() {
        if AMS_LAB_PREFIXES.iter().any(|p| lab.starts_with(p)) {
            return MethodCode::Ams;
        }
        if CONVENTIONAL_LAB_PREFIXES.iter().any(|p| lab.starts_with(p)) {
            return MethodCode::Conventional;
        }
    }

    MethodCode::C14
}

/// Maps a state name or abbreviation to its code; unknown values fall back
/// to their first three characters upper-cased.
pub fn normalize_state(state: &str) -> Option<String> {
    let trimmed = state.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if let Some((_, code)) = STATE_NAMES.iter().find(|(name, _)| *name == lower) {
        return Some((*code).to_string());
    }
    Some(trimmed.to_uppercase().chars().take(3).collect())
}

pub fn derive_state_from_region(region: &str) -> Option<String> {
    let lower = region.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    first_fragment(&lower, BIOREGION_STATE_HINTS).map(str::to_string)
}
