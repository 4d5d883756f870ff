//! Error types for the catalog indexer pipeline.

use std::time::Duration;

use catalog_indexer_repository::{SearchIndexError, SourceError, StateError};
use thiserror::Error;

/// Errors that abort a cycle.
///
/// Every variant is treated as transient by the orchestrator: the cycle is
/// retried from its committed watermark. Per-document problems (malformed
/// rows, rejected documents) are not errors here; they are reported in the
/// cycle's outcome and bound the watermark commit instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Error from the relational source.
    #[error("Source error: {0}")]
    SourceError(#[from] SourceError),

    /// Error from the search index.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),

    /// Error persisting a watermark.
    #[error("State error: {0}")]
    StateError(#[from] StateError),

    /// An operation did not finish within its deadline.
    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    /// Error from the loader component.
    #[error("Loader error: {0}")]
    LoaderError(String),
}

impl PipelineError {
    /// Create a timeout error.
    pub fn timeout(operation: &'static str, limit: Duration) -> Self {
        Self::Timeout { operation, limit }
    }

    /// Create a loader error.
    pub fn loader(msg: impl Into<String>) -> Self {
        Self::LoaderError(msg.into())
    }
}
