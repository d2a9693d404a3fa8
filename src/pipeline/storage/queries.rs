use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::pipeline::processing::normalize::site_name_key;
use crate::types::{AgeDetermination, BatchStatus, Citation, Coordinates, DataSource, Sample, Site};

/// A stored site as seen by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRow {
    pub id: i64,
    pub name: String,
    pub coordinates: Option<Coordinates>,
}

fn coordinates_from(lat: Option<f64>, lon: Option<f64>) -> Option<Coordinates> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        _ => None,
    }
}

/// `code -> id` for a vocabulary table (`dating_method` or `sample_material`).
pub fn load_code_map(conn: &Connection, table: &str) -> Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare(&format!("SELECT id, code FROM {table}"))?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(0)?)))?;
    let mut map = HashMap::new();
    for row in rows {
        let (code, id) = row?;
        map.insert(code, id);
    }
    Ok(map)
}

pub fn find_site_by_name_key(conn: &Connection, name_key: &str) -> Result<Option<SiteRow>> {
    conn.query_row(
        "SELECT id, site_name, latitude, longitude FROM site
         WHERE name_key = ?1 ORDER BY id LIMIT 1",
        params![name_key],
        |row| {
            Ok(SiteRow {
                id: row.get(0)?,
                name: row.get(1)?,
                coordinates: coordinates_from(row.get(2)?, row.get(3)?),
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

/// Sites with coordinates inside a lat/lon box. Callers refine by distance.
pub fn sites_in_box(
    conn: &Connection,
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
) -> Result<Vec<SiteRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, site_name, latitude, longitude FROM site
         WHERE latitude IS NOT NULL AND longitude IS NOT NULL
           AND latitude BETWEEN ?1 AND ?2
           AND longitude BETWEEN ?3 AND ?4
         ORDER BY id",
    )?;
    let rows = stmt.query_map(params![lat_min, lat_max, lon_min, lon_max], |row| {
        Ok(SiteRow {
            id: row.get(0)?,
            name: row.get(1)?,
            coordinates: coordinates_from(row.get(2)?, row.get(3)?),
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Fills in coordinates on a site that has none. Never overwrites.
pub fn backfill_site_coordinates(conn: &Connection, site_id: i64, coords: Coordinates) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE site SET latitude = ?1, longitude = ?2
         WHERE id = ?3 AND (latitude IS NULL OR longitude IS NULL)",
        params![coords.latitude, coords.longitude, site_id],
    )?;
    Ok(updated > 0)
}

pub fn insert_site(conn: &Connection, site: &mut Site) -> Result<i64> {
    let (lat, lon) = match site.coordinates {
        Some(c) => (Some(c.latitude), Some(c.longitude)),
        None => (None, None),
    };
    conn.execute(
        "INSERT INTO site (site_name, name_key, latitude, longitude, state, site_type, region, import_batch_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            site.name,
            site_name_key(&site.name),
            lat,
            lon,
            site.state,
            site.site_type,
            site.region,
            site.import_batch_id.to_string()
        ],
    )?;
    let id = conn.last_insert_rowid();
    site.id = Some(id);
    Ok(id)
}

pub fn get_site(conn: &Connection, site_id: i64) -> Result<Option<Site>> {
    conn.query_row(
        "SELECT site_name, latitude, longitude, state, site_type, region, import_batch_id
         FROM site WHERE id = ?1",
        params![site_id],
        |row| {
            let batch: String = row.get(6)?;
            Ok(Site {
                id: Some(site_id),
                name: row.get(0)?,
                coordinates: coordinates_from(row.get(1)?, row.get(2)?),
                state: row.get(3)?,
                site_type: row.get(4)?,
                region: row.get(5)?,
                import_batch_id: Uuid::parse_str(&batch).unwrap_or_default(),
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

pub fn insert_sample(conn: &Connection, sample: &mut Sample) -> Result<i64> {
    conn.execute(
        "INSERT INTO sample (site_id, material_id, material_description, depth_cm_top,
                             cultural_association, import_batch_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            sample.site_id,
            sample.material_id,
            sample.material_description,
            sample.depth_cm_top,
            sample.cultural_association,
            sample.import_batch_id.to_string()
        ],
    )?;
    let id = conn.last_insert_rowid();
    sample.id = Some(id);
    Ok(id)
}

pub fn age_determination_exists(conn: &Connection, lab_code: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM age_determination WHERE lab_code = ?1",
            params![lab_code],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn insert_age_determination(conn: &Connection, age: &mut AgeDetermination) -> Result<i64> {
    let quality_issues = age
        .quality_issues
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO age_determination (
            sample_id, lab_code, method_id,
            c14_age, c14_error, delta_c13, delta_c13_error,
            lum_age_ka, lum_error_ka,
            age_bp, age_error,
            is_rejected, rejection_reason, quality_issues,
            data_source_id, notes, import_batch_id
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            age.sample_id,
            age.lab_code,
            age.method_id,
            age.c14_age,
            age.c14_error,
            age.delta_c13,
            age.delta_c13_error,
            age.lum_age_ka,
            age.lum_error_ka,
            age.age_bp,
            age.age_error,
            age.is_rejected,
            age.rejection_reason,
            quality_issues,
            age.data_source_id,
            age.notes,
            age.import_batch_id.to_string()
        ],
    )?;
    let id = conn.last_insert_rowid();
    age.id = Some(id);
    Ok(id)
}

pub fn get_age_determination(conn: &Connection, lab_code: &str) -> Result<Option<AgeDetermination>> {
    let row = conn
        .query_row(
            "SELECT id, sample_id, method_id, c14_age, c14_error, delta_c13, delta_c13_error,
                    lum_age_ka, lum_error_ka, age_bp, age_error, is_rejected, rejection_reason,
                    quality_issues, data_source_id, notes, import_batch_id
             FROM age_determination WHERE lab_code = ?1",
            params![lab_code],
            |row| {
                let issues: Option<String> = row.get(13)?;
                let batch: String = row.get(16)?;
                Ok((
                    AgeDetermination {
                        id: row.get(0)?,
                        sample_id: row.get(1)?,
                        lab_code: lab_code.to_string(),
                        method_id: row.get(2)?,
                        c14_age: row.get(3)?,
                        c14_error: row.get(4)?,
                        delta_c13: row.get(5)?,
                        delta_c13_error: row.get(6)?,
                        lum_age_ka: row.get(7)?,
                        lum_error_ka: row.get(8)?,
                        age_bp: row.get(9)?,
                        age_error: row.get(10)?,
                        is_rejected: row.get(11)?,
                        rejection_reason: row.get(12)?,
                        quality_issues: None,
                        data_source_id: row.get(14)?,
                        notes: row.get(15)?,
                        import_batch_id: Uuid::parse_str(&batch).unwrap_or_default(),
                    },
                    issues,
                ))
            },
        )
        .optional()?;

    match row {
        Some((mut age, issues)) => {
            age.quality_issues = issues.as_deref().map(serde_json::from_str).transpose()?;
            Ok(Some(age))
        }
        None => Ok(None),
    }
}

/// Inserts a source unless its citation already exists. Returns the new id,
/// or `None` when the insert was a no-op.
pub fn insert_source_if_absent(conn: &Connection, citation: &Citation) -> Result<Option<i64>> {
    conn.query_row(
        "INSERT INTO data_source (citation, author, year) VALUES (?1, ?2, ?3)
         ON CONFLICT(citation) DO NOTHING
         RETURNING id",
        params![citation.text, citation.author, citation.year],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn find_source_id(conn: &Connection, citation: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM data_source WHERE citation = ?1",
        params![citation],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn get_source(conn: &Connection, source_id: i64) -> Result<Option<DataSource>> {
    conn.query_row(
        "SELECT citation, author, year FROM data_source WHERE id = ?1",
        params![source_id],
        |row| {
            Ok(DataSource {
                id: source_id,
                citation: row.get(0)?,
                author: row.get(1)?,
                year: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

/// Marks a batch completed. Runs inside the run transaction so it commits
/// together with the batch's records.
pub fn complete_batch(conn: &Connection, batch_id: Uuid, record_count: i64, notes: &str) -> Result<()> {
    conn.execute(
        "UPDATE import_batch
         SET status = ?1, completed_at = ?2, record_count = ?3, notes = ?4
         WHERE id = ?5",
        params![
            BatchStatus::Completed.as_str(),
            Utc::now().to_rfc3339(),
            record_count,
            notes,
            batch_id.to_string()
        ],
    )?;
    Ok(())
}
