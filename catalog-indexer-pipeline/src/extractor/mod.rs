//! Batch extraction of aggregated rows.
//!
//! Fetches the aggregated rows for a list of changed ids in bounded pages
//! and lines them up with the ids, so the rest of the cycle can walk them in
//! traversal order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::deadline::bounded;
use crate::errors::PipelineError;
use catalog_indexer_repository::SourceRepository;
use catalog_indexer_shared::{AggregatedRow, ChangedId, EntityKind};

/// A changed id together with its aggregated row.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    pub position: ChangedId,
    /// `None` when the row no longer exists in the source.
    pub row: Option<AggregatedRow>,
}

/// Fetches aggregated rows page by page.
pub struct BatchExtractor {
    source: Arc<dyn SourceRepository>,
    page_size: usize,
    operation_timeout: Duration,
}

impl BatchExtractor {
    pub fn new(source: Arc<dyn SourceRepository>, page_size: usize, operation_timeout: Duration) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            operation_timeout,
        }
    }

    /// Rows for `ids`, one slot per id, in the order of `ids`.
    #[instrument(skip(self, ids), fields(kind = %kind, id_count = ids.len()))]
    pub async fn extract(
        &self,
        kind: EntityKind,
        ids: &[ChangedId],
    ) -> Result<Vec<ExtractedRow>, PipelineError> {
        let mut extracted = Vec::with_capacity(ids.len());

        for page in ids.chunks(self.page_size) {
            let wanted: Vec<String> = page.iter().map(|c| c.id.clone()).collect();
            let rows = bounded(
                self.operation_timeout,
                "fetch_rows",
                self.source.fetch_rows(kind, &wanted),
            )
            .await?;

            let mut by_id: HashMap<String, AggregatedRow> = HashMap::with_capacity(rows.len());
            for row in rows {
                let id = row.id().to_string();
                if by_id.contains_key(&id) {
                    warn!(id = %id, "Source returned duplicate rows, keeping the first");
                    continue;
                }
                by_id.insert(id, row);
            }

            for position in page {
                let row = by_id.remove(&position.id);
                if row.is_none() {
                    debug!(id = %position.id, "Row vanished before extraction");
                }
                extracted.push(ExtractedRow {
                    position: position.clone(),
                    row,
                });
            }

            if !by_id.is_empty() {
                warn!(count = by_id.len(), "Source returned rows that were not requested");
            }
        }

        Ok(extracted)
    }
}
