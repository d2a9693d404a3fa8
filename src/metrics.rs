//! Ingestion metrics.
//!
//! Emitted through the `metrics` facade. Nothing is exported unless the
//! embedding application installs a recorder.

macro_rules! ingest_metric {
    (counter, $name:expr) => {
        concat!("austarch_", $name, "_total")
    };
    (histogram, $name:expr) => {
        concat!("austarch_", $name)
    };
}

/// Outcome of one input record, used as the `outcome` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcomeLabel {
    Loaded,
    Skipped,
    Failed,
}

impl RecordOutcomeLabel {
    fn as_str(&self) -> &'static str {
        match self {
            RecordOutcomeLabel::Loaded => "loaded",
            RecordOutcomeLabel::Skipped => "skipped",
            RecordOutcomeLabel::Failed => "failed",
        }
    }
}

pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_outcome(outcome: RecordOutcomeLabel) {
        ::metrics::counter!(ingest_metric!(counter, "records"), "outcome" => outcome.as_str())
            .increment(1);
    }

    /// `resolution` is one of `created`, `name`, `proximity`.
    pub fn record_site(resolution: &'static str) {
        ::metrics::counter!(ingest_metric!(counter, "sites"), "resolution" => resolution).increment(1);
    }

    pub fn record_run_duration(duration_secs: f64) {
        ::metrics::histogram!(ingest_metric!(histogram, "run_duration_seconds")).record(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert_eq!(ingest_metric!(counter, "records"), "austarch_records_total");
        assert_eq!(ingest_metric!(histogram, "run_duration_seconds"), "austarch_run_duration_seconds");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        IngestMetrics::record_outcome(RecordOutcomeLabel::Loaded);
        IngestMetrics::record_site("created");
        IngestMetrics::record_run_duration(0.5);
    }
}
