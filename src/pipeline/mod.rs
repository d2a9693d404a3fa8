// Ingestion pipeline: reading, processing, storage and batch orchestration

pub mod ingestion;
pub mod orchestrator;
pub mod processing;
pub mod storage;

pub use orchestrator::{BatchOrchestrator, IngestStats, RunReport};
