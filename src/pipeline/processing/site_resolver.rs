use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::constants::SITE_PROXIMITY_METERS;
use crate::error::Result;
use crate::pipeline::processing::normalize::site_name_key;
use crate::pipeline::storage::queries::{self, SiteRow};
use crate::types::{Coordinates, Site, SiteArgs};

const EARTH_RADIUS_METERS: f64 = 6_371_008.8;
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// How a candidate site was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteResolution {
    Created(i64),
    MatchedByName { id: i64, backfilled: bool },
    MatchedByProximity(i64),
}

impl SiteResolution {
    pub fn site_id(&self) -> i64 {
        match *self {
            SiteResolution::Created(id)
            | SiteResolution::MatchedByName { id, .. }
            | SiteResolution::MatchedByProximity(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, SiteResolution::Created(_))
    }

    /// Value of the `resolution` label on the sites counter.
    pub fn metric_label(&self) -> &'static str {
        match self {
            SiteResolution::Created(_) => "created",
            SiteResolution::MatchedByName { .. } => "name",
            SiteResolution::MatchedByProximity(_) => "proximity",
        }
    }
}

/// Great-circle distance in metres.
pub fn haversine_meters(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Deduplicates sites against the store: name identity first, then proximity.
#[derive(Debug, Clone)]
pub struct SiteResolver {
    proximity_meters: f64,
}

impl Default for SiteResolver {
    fn default() -> Self {
        Self {
            proximity_meters: SITE_PROXIMITY_METERS,
        }
    }
}

impl SiteResolver {
    pub fn with_proximity(proximity_meters: f64) -> Self {
        Self { proximity_meters }
    }

    /// Finds a stored site for `name`/`coords` without creating one.
    /// A name match missing coordinates adopts `coords`.
    pub fn find_existing(
        &self,
        conn: &Connection,
        name: &str,
        coords: Option<Coordinates>,
    ) -> Result<Option<SiteResolution>> {
        if let Some(existing) = queries::find_site_by_name_key(conn, &site_name_key(name))? {
            let backfilled = match (existing.coordinates, coords) {
                (None, Some(c)) => queries::backfill_site_coordinates(conn, existing.id, c)?,
                _ => false,
            };
            if backfilled {
                debug!("Backfilled coordinates for site '{}' ({})", existing.name, existing.id);
            }
            return Ok(Some(SiteResolution::MatchedByName {
                id: existing.id,
                backfilled,
            }));
        }

        let Some(point) = coords else {
            return Ok(None);
        };
        Ok(self
            .nearest_within(conn, point)?
            .map(|site| SiteResolution::MatchedByProximity(site.id)))
    }

    /// Nearest stored site within the proximity radius; equal distances go
    /// to the lowest id.
    pub fn nearest_within(&self, conn: &Connection, point: Coordinates) -> Result<Option<SiteRow>> {
        // box prefilter, padded so the haversine pass decides the edge cases
        let dlat = 2.0 * self.proximity_meters / METERS_PER_DEGREE_LAT;
        let cos_lat = point.latitude.to_radians().cos().abs();
        let dlon = if cos_lat > 1e-6 {
            (dlat / cos_lat).min(180.0)
        } else {
            180.0
        };

        let candidates = queries::sites_in_box(
            conn,
            point.latitude - dlat,
            point.latitude + dlat,
            point.longitude - dlon,
            point.longitude + dlon,
        )?;

        let nearest = candidates
            .into_iter()
            .filter_map(|site| {
                let d = haversine_meters(point, site.coordinates?);
                (d <= self.proximity_meters).then_some((d, site))
            })
            .min_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id.cmp(&b.id)))
            .map(|(_, site)| site);
        Ok(nearest)
    }

    /// Resolves the candidate, creating a new site when nothing matches.
    pub fn resolve(&self, conn: &Connection, args: &SiteArgs, batch_id: Uuid) -> Result<SiteResolution> {
        if let Some(found) = self.find_existing(conn, &args.name, args.coordinates)? {
            return Ok(found);
        }
        let mut site = Site::new(args.clone(), batch_id);
        let id = queries::insert_site(conn, &mut site)?;
        debug!("Created site '{}' ({})", site.name, id);
        Ok(SiteResolution::Created(id))
    }
}
