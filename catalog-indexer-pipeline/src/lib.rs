//! # Catalog Indexer Pipeline
//!
//! This crate provides the pipeline components that keep the search index
//! in sync with the relational catalog.
//!
//! ## Architecture
//!
//! Each cycle handles one entity kind and runs these stages in order:
//!
//! 1. **Resolver**: Finds ids changed since the kind's watermark, directly or
//!    through a related entity
//! 2. **Extractor**: Fetches aggregated rows for those ids
//! 3. **Processor**: Transforms rows into search documents
//! 4. **Loader**: Upserts documents into the search index
//! 5. **Orchestrator**: Commits the watermark and schedules the next cycle

mod deadline;
pub mod errors;
pub mod extractor;
pub mod loader;
pub mod orchestrator;
pub mod processor;
pub mod resolver;
pub mod retry;

pub use errors::PipelineError;
pub use extractor::{BatchExtractor, ExtractedRow};
pub use loader::{BulkDelivery, DeliveryOutcome, DeliveryReport, LoaderConfig};
pub use orchestrator::{CycleProgress, CycleSummary, Orchestrator, OrchestratorConfig};
pub use processor::{DocumentTransformer, TransformError};
pub use resolver::{ChangePage, ChangeSetResolver};
pub use retry::{Backoff, RetryPolicy};
