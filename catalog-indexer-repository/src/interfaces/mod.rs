//! Interface definitions for the external collaborators.
//!
//! The pipeline only talks to the relational source, the search index and the
//! watermark store through these traits, so every backend can be swapped for
//! an in-memory implementation in tests.

mod search_index_provider;
mod source_repository;
mod watermark_store;

pub use search_index_provider::SearchIndexProvider;
pub use source_repository::SourceRepository;
pub use watermark_store::WatermarkStore;
