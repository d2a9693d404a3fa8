use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Sample material vocabulary. Codes match the seeded `sample_material` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialCode {
    Charcoal,
    Wood,
    Bone,
    BoneBurnt,
    ShellUnspecified,
    ShellMarine,
    ShellFreshwater,
    ShellTerrestrial,
    Seed,
    Peat,
    SoilOrganic,
    Sediment,
    Hair,
    Eggshell,
    Resin,
    Fiber,
    Dung,
    Quartz,
    Feldspar,
    Sand,
    Calcite,
    ToothEnamel,
    Hearth,
    Ceramic,
    Other,
    Unknown,
}

impl MaterialCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialCode::Charcoal => "CHARCOAL",
            MaterialCode::Wood => "WOOD",
            MaterialCode::Bone => "BONE",
            MaterialCode::BoneBurnt => "BONE_BURNT",
            MaterialCode::ShellUnspecified => "SHELL_UNSPEC",
            MaterialCode::ShellMarine => "SHELL_MARINE",
            MaterialCode::ShellFreshwater => "SHELL_FRESHWATER",
            MaterialCode::ShellTerrestrial => "SHELL_TERRESTRIAL",
            MaterialCode::Seed => "SEED",
            MaterialCode::Peat => "PEAT",
            MaterialCode::SoilOrganic => "SOIL_ORG",
            MaterialCode::Sediment => "SEDIMENT",
            MaterialCode::Hair => "HAIR",
            MaterialCode::Eggshell => "EGGSHELL",
            MaterialCode::Resin => "RESIN",
            MaterialCode::Fiber => "FIBER",
            MaterialCode::Dung => "DUNG",
            MaterialCode::Quartz => "QUARTZ",
            MaterialCode::Feldspar => "FELDSPAR",
            MaterialCode::Sand => "SAND",
            MaterialCode::Calcite => "CALCITE",
            MaterialCode::ToothEnamel => "TOOTH_ENAMEL",
            MaterialCode::Hearth => "HEARTH",
            MaterialCode::Ceramic => "CERAMIC",
            MaterialCode::Other => "OTHER",
            MaterialCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MaterialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dating method vocabulary. Codes match the seeded `dating_method` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodCode {
    /// Radiocarbon, sub-type unknown.
    C14,
    Ams,
    Conventional,
    Osl,
    Tl,
    Irsl,
    UraniumThorium,
    Esr,
    Aar,
    Cosmogenic,
}

impl MethodCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodCode::C14 => "C14",
            MethodCode::Ams => "AMS",
            MethodCode::Conventional => "CONV",
            MethodCode::Osl => "OSL",
            MethodCode::Tl => "TL",
            MethodCode::Irsl => "IRSL",
            MethodCode::UraniumThorium => "U-TH",
            MethodCode::Esr => "ESR",
            MethodCode::Aar => "AAR",
            MethodCode::Cosmogenic => "COSMO",
        }
    }

    pub fn is_radiocarbon(&self) -> bool {
        matches!(self, MethodCode::C14 | MethodCode::Ams | MethodCode::Conventional)
    }

    /// Luminescence ages are stored in thousands of years.
    pub fn is_luminescence(&self) -> bool {
        matches!(self, MethodCode::Osl | MethodCode::Tl | MethodCode::Irsl)
    }
}

impl fmt::Display for MethodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Parsed bibliographic citation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub text: String,
    pub author: Option<String>,
    pub year: Option<i32>,
}

/// One input row, keyed by upper-cased column name.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: &str) {
        self.fields
            .insert(column.trim().to_ascii_uppercase(), value.to_string());
    }

    /// Missing columns read as empty.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(BatchStatus::Running),
            "completed" => Some(BatchStatus::Completed),
            "failed" => Some(BatchStatus::Failed),
            _ => None,
        }
    }
}

/// A physical location samples were taken from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: Option<i64>,
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub state: Option<String>,
    pub site_type: String,
    pub region: String,
    pub import_batch_id: Uuid,
}

/// Arguments for creating a site
#[derive(Debug, Clone)]
pub struct SiteArgs {
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub state: Option<String>,
    pub site_type: String,
    pub region: String,
}

impl Site {
    pub fn new(args: SiteArgs, import_batch_id: Uuid) -> Self {
        Self {
            id: None,
            name: args.name,
            coordinates: args.coordinates,
            state: args.state,
            site_type: args.site_type,
            region: args.region,
            import_batch_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub id: Option<i64>,
    pub site_id: i64,
    pub material_id: Option<i64>,
    pub material_description: String,
    pub depth_cm_top: Option<f64>,
    pub cultural_association: String,
    pub import_batch_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeDetermination {
    pub id: Option<i64>,
    pub sample_id: i64,
    pub lab_code: String,
    pub method_id: Option<i64>,
    pub c14_age: Option<i64>,
    pub c14_error: Option<i64>,
    pub delta_c13: Option<f64>,
    pub delta_c13_error: Option<f64>,
    pub lum_age_ka: Option<f64>,
    pub lum_error_ka: Option<f64>,
    pub age_bp: Option<i64>,
    pub age_error: Option<i64>,
    pub is_rejected: bool,
    pub rejection_reason: Option<String>,
    /// `None` rather than an empty list when there are no issues.
    pub quality_issues: Option<Vec<String>>,
    pub data_source_id: Option<i64>,
    pub notes: String,
    pub import_batch_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: i64,
    pub citation: String,
    pub author: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: Uuid,
    pub source_url: String,
    pub status: BatchStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub record_count: Option<i64>,
    pub notes: Option<String>,
}

impl ImportBatch {
    pub fn new(source_url: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_url: source_url.to_string(),
            status: BatchStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            record_count: None,
            notes: None,
        }
    }
}
