use rusqlite::{Connection, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::metrics::{IngestMetrics, RecordOutcomeLabel};
use crate::pipeline::processing::normalize::NormalizedRecord;
use crate::pipeline::processing::reference_cache::ReferenceCache;
use crate::pipeline::processing::site_resolver::{SiteResolution, SiteResolver};
use crate::pipeline::storage::queries;
use crate::types::{AgeDetermination, RawRecord, Sample};

/// Why a record was skipped without touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingLabCode,
    AlreadyLoaded(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Skipped(SkipReason),
    Loaded {
        site: SiteResolution,
        age_determination_id: i64,
    },
}

/// What happened to one record. Applied to the run statistics only once the
/// record's savepoint has been released.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub disposition: Disposition,
    pub warnings: Vec<String>,
}

impl RecordOutcome {
    pub fn metric_label(&self) -> RecordOutcomeLabel {
        match self.disposition {
            Disposition::Skipped(_) => RecordOutcomeLabel::Skipped,
            Disposition::Loaded { .. } => RecordOutcomeLabel::Loaded,
        }
    }

    fn skipped(reason: SkipReason, warnings: Vec<String>) -> Self {
        Self {
            disposition: Disposition::Skipped(reason),
            warnings,
        }
    }
}

/// Outcome of a single record, or the error that rolled it back.
pub type RowResult = std::result::Result<RecordOutcome, IngestError>;

/// Normalizes, resolves and persists single input records for one batch.
pub struct RecordProcessor<'a> {
    config: &'a Config,
    resolver: SiteResolver,
    batch_id: Uuid,
}

impl<'a> RecordProcessor<'a> {
    pub fn new(config: &'a Config, batch_id: Uuid) -> Self {
        Self {
            config,
            resolver: SiteResolver::default(),
            batch_id,
        }
    }

    /// Processes `raw` inside its own savepoint on `tx`.
    ///
    /// The inner result is the record's own outcome: on a record error the
    /// savepoint is rolled back and the sources cached for this record are
    /// dropped, so neither the store nor the cache keeps anything from it.
    /// The outer error means the run transaction itself is gone or the
    /// savepoint could not be opened or released, which the run cannot
    /// recover from.
    pub fn process_isolated(
        &self,
        tx: &mut Transaction<'_>,
        cache: &mut ReferenceCache,
        raw: &RawRecord,
    ) -> Result<RowResult> {
        let sp = tx.savepoint()?;
        match self.process(&sp, cache, raw) {
            Ok(outcome) => {
                sp.commit()?;
                cache.commit_pending();
                record_committed(&outcome);
                Ok(Ok(outcome))
            }
            Err(e) => {
                cache.discard_pending();
                let rolled_back = sp.finish();
                // some errors make SQLite abort the whole run transaction
                if tx.is_autocommit() {
                    return Err(e);
                }
                rolled_back?;
                IngestMetrics::record_outcome(RecordOutcomeLabel::Failed);
                Ok(Err(e))
            }
        }
    }

    /// Processes `raw` directly on `conn` with no isolation of its own.
    /// Metrics are left to the caller, which knows whether the work committed.
    #[instrument(skip_all)]
    pub fn process(
        &self,
        conn: &Connection,
        cache: &mut ReferenceCache,
        raw: &RawRecord,
    ) -> Result<RecordOutcome> {
        let record = NormalizedRecord::from_raw(raw, self.config);
        let warnings = record.warnings.clone();

        let Some(lab_code) = record.lab_code.clone() else {
            return Ok(RecordOutcome::skipped(SkipReason::MissingLabCode, warnings));
        };

        if self.config.skip_existing && queries::age_determination_exists(conn, &lab_code)? {
            debug!("Skipping existing determination {}", lab_code);
            return Ok(RecordOutcome::skipped(SkipReason::AlreadyLoaded(lab_code), warnings));
        }

        let site = self.resolver.resolve(conn, &record.site, self.batch_id)?;

        let mut sample = Sample {
            id: None,
            site_id: site.site_id(),
            material_id: cache.material_id(record.material_code),
            material_description: record.material_description.clone(),
            depth_cm_top: record.depth_cm_top,
            cultural_association: record.context.clone(),
            import_batch_id: self.batch_id,
        };
        let sample_id = queries::insert_sample(conn, &mut sample)?;

        let data_source_id = match record.citation.as_deref() {
            Some(citation) => cache.get_or_create_source(conn, citation)?,
            None => None,
        };

        let (c14_age, c14_error) = record.radiocarbon_age();
        let (lum_age_ka, lum_error_ka) = record.luminescence_age_ka();
        let mut age = AgeDetermination {
            id: None,
            sample_id,
            lab_code,
            method_id: cache.method_id(record.method),
            c14_age,
            c14_error,
            delta_c13: record.delta_c13,
            delta_c13_error: record.delta_c13_error,
            lum_age_ka,
            lum_error_ka,
            age_bp: record.age,
            age_error: record.age_error,
            is_rejected: record.is_rejected,
            rejection_reason: record.rejection_reason,
            quality_issues: record.quality_issues,
            data_source_id,
            notes: record.notes,
            import_batch_id: self.batch_id,
        };
        let age_determination_id = queries::insert_age_determination(conn, &mut age)?;

        Ok(RecordOutcome {
            disposition: Disposition::Loaded {
                site,
                age_determination_id,
            },
            warnings,
        })
    }
}

fn record_committed(outcome: &RecordOutcome) {
    if let Disposition::Loaded { site, .. } = outcome.disposition {
        IngestMetrics::record_site(site.metric_label());
    }
    IngestMetrics::record_outcome(outcome.metric_label());
}
