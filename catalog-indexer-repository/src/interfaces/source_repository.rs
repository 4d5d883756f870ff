//! Relational source trait definition.

use async_trait::async_trait;

use crate::errors::SourceError;
use chrono::{DateTime, Utc};

use catalog_indexer_shared::{AggregatedRow, ChangedId, EntityKind, Watermark};

/// Read access to the system of record.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Ids of `kind` that changed since `watermark`, directly or through a
    /// related entity.
    ///
    /// Results are de-duplicated, ordered by `(modified, id)` ascending and
    /// start strictly after `after` when given (keyset pagination). At most
    /// `limit` ids are returned.
    async fn changed_ids(
        &self,
        kind: EntityKind,
        watermark: &Watermark,
        after: Option<&ChangedId>,
        limit: usize,
    ) -> Result<Vec<ChangedId>, SourceError>;

    /// Aggregated rows for the given ids of `kind`.
    ///
    /// At most one row per id; ids that no longer exist are absent. Row order
    /// is unspecified.
    async fn fetch_rows(
        &self,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<Vec<AggregatedRow>, SourceError>;

    /// Latest `modified` value in the table of `kind`, `None` when it is empty.
    async fn max_modified(&self, kind: EntityKind) -> Result<Option<DateTime<Utc>>, SourceError>;
}
