//! Post-ingestion steps: bioregion assignment, summary refresh and data
//! quality checks. Each runs in its own transaction after a load.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fmt;
use tracing::{info, instrument};

use crate::config::CoordinateBounds;
use crate::error::Result;

/// Approximate size of the published dataset, used by the record count checks.
pub const EXPECTED_SITES: i64 = 1_748;
pub const EXPECTED_AGE_DETERMINATIONS: i64 = 5_044;

/// Fraction an actual count may differ from the expected one and still pass.
const COUNT_TOLERANCE: f64 = 0.10;

/// A bioregion with its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct Bioregion {
    pub code: String,
    pub name: String,
    pub bounds: CoordinateBounds,
}

/// Inserts or updates a bioregion by code.
pub fn upsert_bioregion(conn: &Connection, region: &Bioregion) -> Result<i64> {
    let id = conn.query_row(
        "INSERT INTO bioregion (code, name, lat_min, lat_max, lon_min, lon_max)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(code) DO UPDATE SET
            name = excluded.name,
            lat_min = excluded.lat_min, lat_max = excluded.lat_max,
            lon_min = excluded.lon_min, lon_max = excluded.lon_max
         RETURNING id",
        params![
            region.code,
            region.name,
            region.bounds.lat_min,
            region.bounds.lat_max,
            region.bounds.lon_min,
            region.bounds.lon_max
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Assigns a bioregion to every site that has coordinates but no bioregion.
/// Where boxes overlap the lowest bioregion id wins. Returns the number of
/// sites updated.
#[instrument(skip_all)]
pub fn assign_bioregions(conn: &mut Connection) -> Result<usize> {
    info!("Assigning bioregions to sites...");
    let tx = conn.transaction()?;
    let updated = tx.execute(
        "UPDATE site SET bioregion_id = (
            SELECT b.id FROM bioregion b
            WHERE site.latitude BETWEEN b.lat_min AND b.lat_max
              AND site.longitude BETWEEN b.lon_min AND b.lon_max
            ORDER BY b.id LIMIT 1
         )
         WHERE latitude IS NOT NULL AND longitude IS NOT NULL
           AND bioregion_id IS NULL
           AND EXISTS (
            SELECT 1 FROM bioregion b
            WHERE site.latitude BETWEEN b.lat_min AND b.lat_max
              AND site.longitude BETWEEN b.lon_min AND b.lon_max
         )",
        [],
    )?;
    tx.commit()?;
    info!("Assigned bioregions to {} sites", updated);
    Ok(updated)
}

/// Rebuilds `summary_stats`. Returns the number of rows written.
#[instrument(skip_all)]
pub fn refresh_summary(conn: &mut Connection) -> Result<usize> {
    info!("Refreshing summary statistics...");
    let refreshed_at = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM summary_stats", [])?;

    let mut written = 0;
    for (metric, sql) in [
        (
            "total",
            "SELECT 'sites' AS dimension, COUNT(*) AS value FROM site
             UNION ALL SELECT 'samples', COUNT(*) FROM sample
             UNION ALL SELECT 'age_determinations', COUNT(*) FROM age_determination",
        ),
        (
            "ages_by_method",
            "SELECT COALESCE(m.code, 'UNKNOWN') AS dimension, COUNT(*) AS value
             FROM age_determination a LEFT JOIN dating_method m ON m.id = a.method_id
             GROUP BY 1",
        ),
        (
            "rejected_by_method",
            "SELECT COALESCE(m.code, 'UNKNOWN') AS dimension, COUNT(*) AS value
             FROM age_determination a LEFT JOIN dating_method m ON m.id = a.method_id
             WHERE a.is_rejected = 1
             GROUP BY 1",
        ),
        (
            "sites_by_state",
            "SELECT COALESCE(state, 'UNKNOWN') AS dimension, COUNT(*) AS value FROM site GROUP BY 1",
        ),
    ] {
        written += tx.execute(
            &format!(
                "INSERT INTO summary_stats (metric, dimension, value, refreshed_at)
                 SELECT ?1, dimension, value, ?2 FROM ({sql})"
            ),
            params![metric, refreshed_at],
        )?;
    }

    tx.commit()?;
    info!("Summary statistics refreshed ({} rows)", written);
    Ok(written)
}

/// Reads one value back from `summary_stats`.
pub fn summary_value(conn: &Connection, metric: &str, dimension: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT value FROM summary_stats WHERE metric = ?1 AND dimension = ?2",
            params![metric, dimension],
            |row| row.get(0),
        )
        .optional()?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// A data quality check and the number of rows it flagged.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityCheck {
    pub name: &'static str,
    pub issue_count: i64,
    pub severity: Severity,
}

/// An actual table size compared with what the dataset should contain.
#[derive(Debug, Clone, PartialEq)]
pub struct CountCheck {
    pub metric: &'static str,
    pub expected: i64,
    pub actual: i64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub quality: Vec<QualityCheck>,
    pub counts: Vec<CountCheck>,
}

const QUALITY_CHECKS: &[(&str, Severity, &str)] = &[
    (
        "sites_without_coordinates",
        Severity::Warning,
        "SELECT COUNT(*) FROM site WHERE latitude IS NULL OR longitude IS NULL",
    ),
    (
        "sites_without_samples",
        Severity::Warning,
        "SELECT COUNT(*) FROM site s WHERE NOT EXISTS (SELECT 1 FROM sample WHERE site_id = s.id)",
    ),
    (
        "samples_without_material",
        Severity::Info,
        "SELECT COUNT(*) FROM sample WHERE material_id IS NULL",
    ),
    (
        "ages_without_method",
        Severity::Warning,
        "SELECT COUNT(*) FROM age_determination WHERE method_id IS NULL",
    ),
    (
        "ages_without_value",
        Severity::Error,
        "SELECT COUNT(*) FROM age_determination WHERE age_bp IS NULL AND lum_age_ka IS NULL",
    ),
    (
        "ages_without_source",
        Severity::Info,
        "SELECT COUNT(*) FROM age_determination WHERE data_source_id IS NULL",
    ),
    (
        "rejected_ages",
        Severity::Info,
        "SELECT COUNT(*) FROM age_determination WHERE is_rejected = 1",
    ),
];

/// Runs the fixed data quality and record count checks. Results are logged
/// and returned; nothing is modified.
#[instrument(skip_all)]
pub fn validate(conn: &Connection, bounds: &CoordinateBounds) -> Result<ValidationReport> {
    info!("Running validation checks...");

    let mut quality = Vec::with_capacity(QUALITY_CHECKS.len() + 1);
    for &(name, severity, sql) in QUALITY_CHECKS {
        let issue_count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        quality.push(QualityCheck {
            name,
            issue_count,
            severity,
        });
    }
    let out_of_bounds: i64 = conn.query_row(
        "SELECT COUNT(*) FROM site
         WHERE latitude IS NOT NULL AND longitude IS NOT NULL
           AND (latitude NOT BETWEEN ?1 AND ?2 OR longitude NOT BETWEEN ?3 AND ?4)",
        params![bounds.lat_min, bounds.lat_max, bounds.lon_min, bounds.lon_max],
        |row| row.get(0),
    )?;
    quality.push(QualityCheck {
        name: "sites_out_of_bounds",
        issue_count: out_of_bounds,
        severity: Severity::Error,
    });

    let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |row| row.get(0)) };
    let sites = count("SELECT COUNT(*) FROM site")?;
    let samples = count("SELECT COUNT(*) FROM sample")?;
    let ages = count("SELECT COUNT(*) FROM age_determination")?;
    let counts = vec![
        approx_check("sites", EXPECTED_SITES, sites),
        approx_check("age_determinations", EXPECTED_AGE_DETERMINATIONS, ages),
        CountCheck {
            metric: "samples_match_ages",
            expected: ages,
            actual: samples,
            passed: samples == ages,
        },
    ];

    info!("Validation results:");
    for check in &quality {
        let mark = if check.issue_count == 0 { "ok" } else { "!!" };
        info!("  [{}] {}: {} ({})", mark, check.name, check.issue_count, check.severity);
    }
    info!("Record count verification:");
    for check in &counts {
        let mark = if check.passed { "PASS" } else { "CHECK" };
        info!("  [{}] {}: {} (expected ~{})", mark, check.metric, check.actual, check.expected);
    }

    Ok(ValidationReport { quality, counts })
}

fn approx_check(metric: &'static str, expected: i64, actual: i64) -> CountCheck {
    let diff = (actual - expected).abs() as f64;
    CountCheck {
        metric,
        expected,
        actual,
        passed: diff <= expected as f64 * COUNT_TOLERANCE,
    }
}
