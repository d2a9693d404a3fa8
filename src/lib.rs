pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod postprocess;
pub mod types;

pub use config::Config;
pub use error::{IngestError, Result};
pub use pipeline::{BatchOrchestrator, IngestStats, RunReport};
