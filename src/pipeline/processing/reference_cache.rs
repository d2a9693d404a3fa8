use rusqlite::Connection;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{IngestError, Result};
use crate::pipeline::processing::normalize::parse_citation;
use crate::pipeline::storage::queries;
use crate::types::{MaterialCode, MethodCode};

/// Per-run cache of vocabulary ids and citation sources.
///
/// Method and material tables are loaded once. Citation sources are
/// resolved lazily; ids resolved while a record is in flight stay pending
/// until [`ReferenceCache::commit_pending`] so that a rolled-back record
/// cannot leave an id for a row that no longer exists.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    methods: HashMap<String, i64>,
    materials: HashMap<String, i64>,
    sources: HashMap<String, i64>,
    pending_sources: HashMap<String, i64>,
    source_lookups: usize,
}

impl ReferenceCache {
    pub fn load(conn: &Connection) -> Result<Self> {
        let methods = queries::load_code_map(conn, "dating_method")?;
        let materials = queries::load_code_map(conn, "sample_material")?;
        if methods.is_empty() || materials.is_empty() {
            return Err(IngestError::MissingReference(
                "dating_method and sample_material must be populated".to_string(),
            ));
        }
        info!(
            "Loaded reference data: {} methods, {} materials",
            methods.len(),
            materials.len()
        );
        Ok(Self {
            methods,
            materials,
            ..Self::default()
        })
    }

    pub fn method_id(&self, code: MethodCode) -> Option<i64> {
        self.methods.get(code.as_str()).copied()
    }

    pub fn material_id(&self, code: MaterialCode) -> Option<i64> {
        self.materials.get(code.as_str()).copied()
    }

    /// Returns the id of the source for `citation`, creating it if needed.
    pub fn get_or_create_source(&mut self, conn: &Connection, citation: &str) -> Result<Option<i64>> {
        if citation.is_empty() {
            return Ok(None);
        }
        if let Some(id) = self
            .sources
            .get(citation)
            .or_else(|| self.pending_sources.get(citation))
        {
            return Ok(Some(*id));
        }

        self.source_lookups += 1;
        let parsed = parse_citation(citation);
        let id = match queries::insert_source_if_absent(conn, &parsed)? {
            Some(id) => {
                debug!("Created data source {} for '{}'", id, citation);
                Some(id)
            }
            // inserted by an earlier run or a concurrent writer
            None => queries::find_source_id(conn, &parsed.text)?,
        };

        if let Some(id) = id {
            self.pending_sources.insert(citation.to_string(), id);
        }
        Ok(id)
    }

    /// Keeps sources resolved by the record that just committed.
    pub fn commit_pending(&mut self) {
        self.sources.extend(self.pending_sources.drain());
    }

    /// Forgets sources resolved by a record that rolled back.
    pub fn discard_pending(&mut self) {
        self.pending_sources.clear();
    }

    /// Number of citations resolved against the store this run.
    pub fn source_lookups(&self) -> usize {
        self.source_lookups
    }
}
