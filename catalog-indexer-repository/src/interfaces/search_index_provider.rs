//! Search index provider trait definition.

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::opensearch::IndexConfig;
use crate::types::{BulkItem, BulkItemResult};

/// Write access to the search index the catalog documents live in.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Create the index described by `config` if it does not exist yet.
    ///
    /// Existing indices are left untouched; mappings are never migrated.
    async fn ensure_index(&self, config: &IndexConfig) -> Result<(), SearchIndexError>;

    /// Upsert a batch of documents in one bulk request.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<BulkItemResult>)` - One result per item, in submission order. Items the
    ///   index rejected are reported here with `success: false`.
    /// * `Err(SearchIndexError)` - If the request as a whole failed
    async fn bulk_upsert(&self, items: &[BulkItem]) -> Result<Vec<BulkItemResult>, SearchIndexError>;

    /// Check if the search engine is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchIndexError>;
}
