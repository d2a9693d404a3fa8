use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing reference data: {0}")]
    MissingReference(String),

    #[error("Batch {batch_id} aborted: {source}")]
    BatchAborted {
        batch_id: Uuid,
        #[source]
        source: Box<IngestError>,
    },
}

impl IngestError {
    /// Wraps a fatal run failure with the id of the batch it interrupted.
    pub fn aborted(batch_id: Uuid, source: IngestError) -> Self {
        IngestError::BatchAborted {
            batch_id,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
