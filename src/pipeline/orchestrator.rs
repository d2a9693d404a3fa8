use rusqlite::Transaction;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::constants::{MAX_LOGGED_ROW_ERRORS, MAX_SUMMARY_ERRORS};
use crate::error::{IngestError, Result};
use crate::metrics::IngestMetrics;
use crate::pipeline::ingestion::{discover_input_files, DelimitedFile};
use crate::pipeline::processing::{Disposition, RecordOutcome, RecordProcessor, ReferenceCache};
use crate::pipeline::storage::{queries, Store};

/// Counters for one file or a whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    pub sites_created: usize,
    pub sites_matched: usize,
    pub samples_created: usize,
    pub ages_created: usize,
    pub ages_skipped: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl IngestStats {
    /// Folds in the outcome of a record that committed.
    pub fn apply(&mut self, outcome: RecordOutcome) {
        match outcome.disposition {
            Disposition::Skipped(_) => self.ages_skipped += 1,
            Disposition::Loaded { site, .. } => {
                if site.is_created() {
                    self.sites_created += 1;
                } else {
                    self.sites_matched += 1;
                }
                self.samples_created += 1;
                self.ages_created += 1;
            }
        }
        self.warnings.extend(outcome.warnings);
    }

    pub fn merge(&mut self, other: IngestStats) {
        self.sites_created += other.sites_created;
        self.sites_matched += other.sites_matched;
        self.samples_created += other.samples_created;
        self.ages_created += other.ages_created;
        self.ages_skipped += other.ages_skipped;
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }

    /// Summary stored on the completed batch.
    pub fn batch_notes(&self) -> String {
        format!(
            "Sites: {} new, {} matched. Ages: {} created, {} skipped.",
            self.sites_created, self.sites_matched, self.ages_created, self.ages_skipped
        )
    }

    /// The first few errors, then a count of the rest.
    pub fn error_summary(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .errors
            .iter()
            .take(MAX_SUMMARY_ERRORS)
            .cloned()
            .collect();
        if self.errors.len() > MAX_SUMMARY_ERRORS {
            lines.push(format!("... and {} more", self.errors.len() - MAX_SUMMARY_ERRORS));
        }
        lines
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub batch_id: Uuid,
    pub files: Vec<PathBuf>,
    pub stats: IngestStats,
}

/// Runs the record processor over every input file as one batch.
pub struct BatchOrchestrator<'a> {
    config: &'a Config,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Ingests every input file in the configured data directory.
    ///
    /// All records of the run commit together. A failure that is not
    /// confined to one record rolls the whole run back and comes back as
    /// [`IngestError::BatchAborted`]; the batch row itself stays `running`
    /// for the caller to mark failed.
    #[instrument(skip_all, fields(data_dir = %self.config.data_dir.display()))]
    pub fn run(&self, store: &mut Store) -> Result<RunReport> {
        let data_dir = &self.config.data_dir;
        if !data_dir.is_dir() {
            return Err(IngestError::Config(format!(
                "Data directory not found: {} (download the data from {} and place the CSV files there)",
                data_dir.display(),
                self.config.source_locator
            )));
        }

        let files = discover_input_files(data_dir)?;
        if files.is_empty() {
            warn!("No CSV/TSV files found in {}", data_dir.display());
        } else {
            info!("Found {} data file(s)", files.len());
        }

        let started = Instant::now();
        let batch = store.create_batch(&self.config.source_locator)?;
        info!(batch_id = %batch.id, "Starting ingestion run");

        let stats = self
            .run_batch(store, batch.id, &files)
            .map_err(|e| IngestError::aborted(batch.id, e))?;

        IngestMetrics::record_run_duration(started.elapsed().as_secs_f64());
        log_summary(&stats);
        info!(batch_id = %batch.id, "Finished ingestion run");

        Ok(RunReport {
            batch_id: batch.id,
            files,
            stats,
        })
    }

    fn run_batch(&self, store: &mut Store, batch_id: Uuid, files: &[PathBuf]) -> Result<IngestStats> {
        let mut tx = store.begin_run()?;
        let mut cache = ReferenceCache::load(&tx)?;
        let processor = RecordProcessor::new(self.config, batch_id);

        let mut total = IngestStats::default();
        for path in files {
            let stats = self.ingest_file(&mut tx, &mut cache, &processor, path)?;
            total.merge(stats);
        }

        queries::complete_batch(
            &tx,
            batch_id,
            total.ages_created as i64,
            &total.batch_notes(),
        )?;
        tx.commit()?;
        debug!("Resolved {} citations against the store", cache.source_lookups());
        Ok(total)
    }

    #[instrument(skip(self, tx, cache, processor))]
    fn ingest_file(
        &self,
        tx: &mut Transaction<'_>,
        cache: &mut ReferenceCache,
        processor: &RecordProcessor<'_>,
        path: &Path,
    ) -> Result<IngestStats> {
        let mut file = DelimitedFile::open(path)?;
        info!("Processing data file: {}", file.name());

        let progress_every = self.config.batch_size.max(1);
        let mut stats = IngestStats::default();
        let mut logged_warnings = 0;
        for (i, row) in file.records()?.enumerate() {
            let row_number = i + 1;
            let result = match row {
                Ok(raw) => processor.process_isolated(tx, cache, &raw)?,
                Err(e) => Err(e),
            };
            match result {
                Ok(mut outcome) => {
                    for warning in &mut outcome.warnings {
                        *warning = format!("Row {row_number}: {warning}");
                        if logged_warnings < MAX_LOGGED_ROW_ERRORS {
                            warn!("{}", warning);
                            logged_warnings += 1;
                        }
                    }
                    stats.apply(outcome);
                }
                Err(e) => {
                    stats.errors.push(format!("Row {row_number}: {e}"));
                    if stats.errors.len() <= MAX_LOGGED_ROW_ERRORS {
                        warn!("Error on row {}: {}", row_number, e);
                    }
                }
            }
            if row_number % progress_every == 0 {
                info!("  Processed {} rows...", row_number);
            }
        }

        info!(
            "Finished {}: {} ages created, {} skipped, {} errors",
            path.display(),
            stats.ages_created,
            stats.ages_skipped,
            stats.errors.len()
        );
        Ok(stats)
    }
}

fn log_summary(stats: &IngestStats) {
    info!("Ingestion complete");
    info!("Sites created: {}", stats.sites_created);
    info!("Sites matched: {}", stats.sites_matched);
    info!("Samples created: {}", stats.samples_created);
    info!("Ages created: {}", stats.ages_created);
    info!("Ages skipped: {}", stats.ages_skipped);

    if !stats.warnings.is_empty() {
        warn!("Warnings: {}", stats.warnings.len());
        for warning in stats.warnings.iter().take(MAX_SUMMARY_ERRORS) {
            debug!("  - {}", warning);
        }
    }
    if !stats.errors.is_empty() {
        warn!("Errors encountered: {}", stats.errors.len());
        for line in stats.error_summary() {
            warn!("  - {}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::{SiteResolution, SkipReason};

    fn loaded(site: SiteResolution) -> RecordOutcome {
        RecordOutcome {
            disposition: Disposition::Loaded {
                site,
                age_determination_id: 1,
            },
            warnings: vec![],
        }
    }

    #[test]
    fn test_stats_apply_and_notes() {
        let mut stats = IngestStats::default();
        stats.apply(loaded(SiteResolution::Created(1)));
        stats.apply(loaded(SiteResolution::MatchedByName { id: 1, backfilled: false }));
        stats.apply(loaded(SiteResolution::MatchedByProximity(1)));
        stats.apply(RecordOutcome {
            disposition: Disposition::Skipped(SkipReason::MissingLabCode),
            warnings: vec!["Invalid coordinates: 0, 0".to_string()],
        });

        assert_eq!(stats.sites_created, 1);
        assert_eq!(stats.sites_matched, 2);
        assert_eq!(stats.samples_created, 3);
        assert_eq!(stats.ages_skipped, 1);
        assert_eq!(stats.warnings.len(), 1);
        assert_eq!(
            stats.batch_notes(),
            "Sites: 1 new, 2 matched. Ages: 3 created, 1 skipped."
        );
    }

    #[test]
    fn test_merge() {
        let mut total = IngestStats::default();
        let mut a = IngestStats::default();
        a.apply(loaded(SiteResolution::Created(1)));
        a.errors.push("Row 2: boom".to_string());
        total.merge(a.clone());
        total.merge(a);

        assert_eq!(total.ages_created, 2);
        assert_eq!(total.errors.len(), 2);
    }

    #[test]
    fn test_error_summary_truncates() {
        let stats = IngestStats {
            errors: (1..=13).map(|i| format!("Row {i}: bad")).collect(),
            ..IngestStats::default()
        };
        let summary = stats.error_summary();
        assert_eq!(summary.len(), 11);
        assert_eq!(summary[0], "Row 1: bad");
        assert_eq!(summary[10], "... and 3 more");

        let few = IngestStats {
            errors: vec!["Row 1: bad".to_string()],
            ..IngestStats::default()
        };
        assert_eq!(few.error_summary(), vec!["Row 1: bad".to_string()]);
    }
}
