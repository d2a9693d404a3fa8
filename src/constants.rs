//! Vocabulary tables used by the field normalizers.
//!
//! Every table here is scanned front to back and the first matching fragment
//! wins, so a fragment must appear before any shorter fragment it contains.

use crate::types::{MaterialCode, MethodCode};

/// Values treated as "no value" by the numeric parsers.
pub const MISSING_SENTINELS: &[&str] = &["", "NA", "N/A", "-", "null", "NULL"];

/// Laboratory codes that mean "not applicable".
pub const LAB_CODE_SENTINELS: &[&str] = &["NA", "N/A", "-", "NULL"];

pub const MIN_LAB_CODE_LEN: usize = 3;

/// Files whose lower-cased name contains one of these hold citation lists,
/// not dating records.
pub const REFERENCE_FILE_MARKERS: &[&str] = &["citation", "reference"];

pub const INPUT_EXTENSIONS: &[&str] = &["csv", "tsv"];

/// Bytes inspected when sniffing the delimiter.
pub const DELIMITER_SNIFF_BYTES: usize = 4096;

/// Distance under which two sites are considered the same place.
pub const SITE_PROXIMITY_METERS: f64 = 100.0;

pub const DEFAULT_SITE_NAME: &str = "Unknown Site";

/// Row errors (and row warnings) logged individually per file before the
/// rest are only counted.
pub const MAX_LOGGED_ROW_ERRORS: usize = 5;

/// Errors listed in the run summary.
pub const MAX_SUMMARY_ERRORS: usize = 10;

pub const MATERIAL_FRAGMENTS: &[(&str, MaterialCode)] = &[
    ("charcoal", MaterialCode::Charcoal),
    ("wood", MaterialCode::Wood),
    ("burnt bone", MaterialCode::BoneBurnt),
    ("calcined bone", MaterialCode::BoneBurnt),
    ("bone", MaterialCode::Bone),
    ("emu eggshell", MaterialCode::Eggshell),
    ("eggshell", MaterialCode::Eggshell),
    ("marine shell", MaterialCode::ShellMarine),
    ("freshwater shell", MaterialCode::ShellFreshwater),
    ("land snail", MaterialCode::ShellTerrestrial),
    ("shell", MaterialCode::ShellUnspecified),
    ("seeds", MaterialCode::Seed),
    ("seed", MaterialCode::Seed),
    ("plant", MaterialCode::Seed),
    ("peat", MaterialCode::Peat),
    ("soil", MaterialCode::SoilOrganic),
    ("sediment", MaterialCode::Sediment),
    ("organic", MaterialCode::SoilOrganic),
    ("hair", MaterialCode::Hair),
    ("resin", MaterialCode::Resin),
    ("fibre", MaterialCode::Fiber),
    ("fiber", MaterialCode::Fiber),
    ("dung", MaterialCode::Dung),
    ("quartz", MaterialCode::Quartz),
    ("feldspar", MaterialCode::Feldspar),
    ("sand", MaterialCode::Sand),
    ("calcite", MaterialCode::Calcite),
    ("tooth", MaterialCode::ToothEnamel),
    ("enamel", MaterialCode::ToothEnamel),
    ("hearth", MaterialCode::Hearth),
    ("ceramic", MaterialCode::Ceramic),
    ("pottery", MaterialCode::Ceramic),
];

/// Tier 1: luminescence techniques.
pub const LUMINESCENCE_KEYWORDS: &[(&str, MethodCode)] = &[
    ("osl", MethodCode::Osl),
    ("optically stimulated", MethodCode::Osl),
    ("irsl", MethodCode::Irsl),
    ("tl", MethodCode::Tl),
    ("thermoluminescence", MethodCode::Tl),
];

/// Tier 2: other non-radiocarbon techniques.
pub const OTHER_TECHNIQUE_KEYWORDS: &[(&str, MethodCode)] = &[
    ("u-th", MethodCode::UraniumThorium),
    ("uranium", MethodCode::UraniumThorium),
    ("u-series", MethodCode::UraniumThorium),
    ("esr", MethodCode::Esr),
    ("electron spin", MethodCode::Esr),
    ("aar", MethodCode::Aar),
    ("amino acid", MethodCode::Aar),
    ("cosmogenic", MethodCode::Cosmogenic),
];

/// Tier 3: radiocarbon sub-types.
pub const RADIOCARBON_KEYWORDS: &[(&str, MethodCode)] = &[
    ("ams", MethodCode::Ams),
    ("accelerator", MethodCode::Ams),
    ("conventional", MethodCode::Conventional),
    ("radiometric", MethodCode::Conventional),
];

/// Tier 4: laboratory code prefixes of AMS facilities.
pub const AMS_LAB_PREFIXES: &[&str] = &[
    "OZ", "SANU", "ANUA", "CAMS", "AA-", "BETA", "UBA", "UCIAMS", "D-AMS",
];

/// Tier 4: laboratory code prefixes of conventional (beta counting) facilities.
pub const CONVENTIONAL_LAB_PREFIXES: &[&str] = &[
    "I-", "GX-", "GAK-", "SUA-", "ANU-", "NZ-", "GRN-", "W-",
];

/// Exact state names and abbreviations, keyed lower-case.
pub const STATE_NAMES: &[(&str, &str)] = &[
    ("nsw", "NSW"),
    ("new south wales", "NSW"),
    ("vic", "VIC"),
    ("victoria", "VIC"),
    ("qld", "QLD"),
    ("queensland", "QLD"),
    ("sa", "SA"),
    ("south australia", "SA"),
    ("wa", "WA"),
    ("western australia", "WA"),
    ("nt", "NT"),
    ("northern territory", "NT"),
    ("tas", "TAS"),
    ("tasmania", "TAS"),
    ("act", "ACT"),
    ("australian capital territory", "ACT"),
];

/// Bioregion name fragments that imply a state.
pub const BIOREGION_STATE_HINTS: &[(&str, &str)] = &[
    ("australian alps", "ACT"),
    ("south east corner", "NSW"),
    ("new england", "NSW"),
    ("great victoria", "WA"),
    ("little sandy", "WA"),
    ("stony plains", "SA"),
    ("cape york", "QLD"),
    ("wet tropics", "QLD"),
    ("pine creek", "NT"),
    ("sydney", "NSW"),
    ("riverina", "NSW"),
    ("darling", "NSW"),
    ("murray", "NSW"),
    ("nandewar", "NSW"),
    ("brigalow", "QLD"),
    ("einasleigh", "QLD"),
    ("mulga", "QLD"),
    ("mitchell", "QLD"),
    ("gippsland", "VIC"),
    ("victorian", "VIC"),
    ("mallee", "VIC"),
    ("nullarbor", "SA"),
    ("flinders", "SA"),
    ("eyre", "SA"),
    ("gawler", "SA"),
    ("simpson", "SA"),
    ("naracoorte", "SA"),
    ("pilbara", "WA"),
    ("kimberley", "WA"),
    ("carnarvon", "WA"),
    ("murchison", "WA"),
    ("geraldton", "WA"),
    ("jarrah", "WA"),
    ("esperance", "WA"),
    ("coolgardie", "WA"),
    ("gibson", "WA"),
    ("arnhem", "NT"),
    ("darwin", "NT"),
    ("tanami", "NT"),
    ("macdonnell", "NT"),
    ("finke", "NT"),
    ("barkly", "NT"),
    ("tasmanian", "TAS"),
    ("furneaux", "TAS"),
    ("gulf", "QLD"),
    ("swan", "WA"),
    ("sturt", "NT"),
    ("king", "TAS"),
];

/// Input column names, matched case-insensitively against file headers.
pub mod columns {
    pub const SITE: &str = "SITE";
    pub const SITE_TYPE: &str = "SITE_TYPE";
    pub const IBRA_REGION: &str = "IBRA_REGION";
    pub const STATE: &str = "STATE";
    pub const LATITUDE: &str = "LATITUDE";
    pub const LONGITUDE: &str = "LONGITUDE";
    pub const MATERIAL: &str = "MATERIAL";
    pub const MATERIAL_TOP_LEVEL: &str = "MATERIAL_TOP_LEVEL";
    pub const DEPTH: &str = "DEPTH_FROM_SURFACE_CM";
    pub const CONTEXT: &str = "CONTEXT";
    pub const METHOD: &str = "METHOD";
    pub const TECHNIQUE: &str = "TECHNIQUE";
    pub const LAB_CODE: &str = "LAB_CODE";
    pub const AGE: &str = "AGE";
    pub const ERROR: &str = "ERROR";
    pub const C13_AGE: &str = "C13_AGE";
    pub const C13_ERROR: &str = "C13_ERROR";
    pub const SOURCE: &str = "SOURCE";
    pub const DATE_ISSUES: &str = "DATE_ISSUES";
    pub const ADDITIONAL_DATA_ISSUES: &str = "ADDITIONAL_DATA_ISSUES";
    pub const NOTES: &str = "NOTES";
}
