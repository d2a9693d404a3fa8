use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{IngestError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "austarch.toml";

/// Ingestion settings. Every field has a default; a TOML file and the
/// `AUSTARCH_*` environment variables override them in that order.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub source_locator: String,
    /// Rows between progress log lines.
    pub batch_size: usize,
    pub skip_existing: bool,
    pub validate_coordinates: bool,
    pub bounds: CoordinateBounds,
}

/// Accepted latitude/longitude band. Defaults cover the Australian mainland
/// and Tasmania.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoordinateBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Default for CoordinateBounds {
    fn default() -> Self {
        Self {
            lat_min: -43.7,
            lat_max: -10.0,
            lon_min: 112.0,
            lon_max: 154.0,
        }
    }
}

impl CoordinateBounds {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lon_min..=self.lon_max).contains(&lon)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("austarch.db"),
            data_dir: PathBuf::from("./data"),
            source_locator: "https://doi.org/10.5284/1027216".to_string(),
            batch_size: 500,
            skip_existing: true,
            validate_coordinates: true,
            bounds: CoordinateBounds::default(),
        }
    }
}

impl Config {
    /// Loads defaults, then `path` (or `austarch.toml` if it exists), then the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Applies `AUSTARCH_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AUSTARCH_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("AUSTARCH_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("AUSTARCH_SOURCE_URL") {
            self.source_locator = v;
        }
        if let Some(v) = lookup("AUSTARCH_BATCH_SIZE") {
            self.batch_size = parse_var("AUSTARCH_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("AUSTARCH_SKIP_EXISTING") {
            self.skip_existing = parse_flag("AUSTARCH_SKIP_EXISTING", &v)?;
        }
        if let Some(v) = lookup("AUSTARCH_VALIDATE_COORDINATES") {
            self.validate_coordinates = parse_flag("AUSTARCH_VALIDATE_COORDINATES", &v)?;
        }
        if let Some(v) = lookup("AUSTARCH_LAT_MIN") {
            self.bounds.lat_min = parse_var("AUSTARCH_LAT_MIN", &v)?;
        }
        if let Some(v) = lookup("AUSTARCH_LAT_MAX") {
            self.bounds.lat_max = parse_var("AUSTARCH_LAT_MAX", &v)?;
        }
        if let Some(v) = lookup("AUSTARCH_LON_MIN") {
            self.bounds.lon_min = parse_var("AUSTARCH_LON_MIN", &v)?;
        }
        if let Some(v) = lookup("AUSTARCH_LON_MAX") {
            self.bounds.lon_max = parse_var("AUSTARCH_LON_MAX", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IngestError::Config("batch_size must be at least 1".to_string()));
        }
        let b = &self.bounds;
        if b.lat_min > b.lat_max || b.lon_min > b.lon_max {
            return Err(IngestError::Config(format!(
                "coordinate bounds are inverted: lat {}..{}, lon {}..{}",
                b.lat_min, b.lat_max, b.lon_min, b.lon_max
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| IngestError::Config(format!("{key} has an invalid value: '{value}'")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(IngestError::Config(format!("{key} must be a boolean, got '{value}'"))),
    }
}
