// Pipeline processing: normalization, reference lookups, site resolution and record loading

pub mod normalize;
pub mod record_processor;
pub mod reference_cache;
pub mod site_resolver;

pub use record_processor::{Disposition, RecordOutcome, RecordProcessor, RowResult, SkipReason};
pub use reference_cache::ReferenceCache;
pub use site_resolver::{SiteResolution, SiteResolver};
