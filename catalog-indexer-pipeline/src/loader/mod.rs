//! Loader module for the catalog indexer pipeline.
//!
//! Delivers documents to the search index in chunked bulk requests and
//! reports the outcome of every document.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::deadline::bounded;
use crate::errors::PipelineError;
use catalog_indexer_repository::{BulkItem, IndexConfig, SearchIndexProvider};
use catalog_indexer_shared::SearchDocument;

/// Configuration for bulk delivery.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Maximum number of documents per bulk request.
    pub chunk_size: usize,
    /// Deadline for a single bulk request.
    pub operation_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            operation_timeout: Duration::from_secs(30),
        }
    }
}

/// What happened to one delivered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Outcomes of one delivery, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    outcomes: Vec<(String, DeliveryOutcome)>,
}

impl DeliveryReport {
    /// `(document id, outcome)` pairs in input order.
    pub fn outcomes(&self) -> &[(String, DeliveryOutcome)] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_delivered()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.delivered_count()
    }

    /// Index of the first failed document.
    pub fn first_failure(&self) -> Option<usize> {
        self.outcomes.iter().position(|(_, o)| !o.is_delivered())
    }
}

/// Bulk delivery into the search index.
pub struct BulkDelivery {
    client: Arc<dyn SearchIndexProvider>,
    config: LoaderConfig,
}

impl BulkDelivery {
    /// Create a new bulk delivery with the given client.
    pub fn new(client: Arc<dyn SearchIndexProvider>) -> Self {
        Self::with_config(client, LoaderConfig::default())
    }

    /// Create a new bulk delivery with custom configuration.
    pub fn with_config(client: Arc<dyn SearchIndexProvider>, mut config: LoaderConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        Self { client, config }
    }

    /// Upsert `documents`, one bulk request per chunk.
    ///
    /// Rejected documents are reported and never stop the remaining items or
    /// chunks. A request-level failure aborts the delivery with an error.
    #[instrument(skip(self, documents), fields(document_count = documents.len()))]
    pub async fn deliver(&self, documents: &[SearchDocument]) -> Result<DeliveryReport, PipelineError> {
        let mut outcomes = Vec::with_capacity(documents.len());

        for chunk in documents.chunks(self.config.chunk_size) {
            let mut chunk_outcomes: Vec<Option<DeliveryOutcome>> = vec![None; chunk.len()];
            let mut items = Vec::with_capacity(chunk.len());
            let mut slots = Vec::with_capacity(chunk.len());

            for (slot, document) in chunk.iter().enumerate() {
                match BulkItem::upsert(document) {
                    Ok(item) => {
                        items.push(item);
                        slots.push(slot);
                    }
                    Err(e) => {
                        warn!(id = %document.id(), error = %e, "Document could not be serialized");
                        chunk_outcomes[slot] = Some(DeliveryOutcome::Failed {
                            reason: format!("serialization failed: {}", e),
                        });
                    }
                }
            }

            if !items.is_empty() {
                let results = bounded(
                    self.config.operation_timeout,
                    "bulk_upsert",
                    self.client.bulk_upsert(&items),
                )
                .await?;

                if results.len() != items.len() {
                    return Err(PipelineError::loader(format!(
                        "bulk response has {} results for {} items",
                        results.len(),
                        items.len()
                    )));
                }

                for (slot, result) in slots.into_iter().zip(results) {
                    chunk_outcomes[slot] = Some(if result.success {
                        DeliveryOutcome::Delivered
                    } else {
                        let reason = result.error.unwrap_or_else(|| "rejected".to_string());
                        warn!(id = %result.id, reason = %reason, "Document rejected by index");
                        DeliveryOutcome::Failed { reason }
                    });
                }
            }

            for (document, outcome) in chunk.iter().zip(chunk_outcomes) {
                let outcome = outcome.unwrap_or_else(|| DeliveryOutcome::Failed {
                    reason: "no result".to_string(),
                });
                outcomes.push((document.id().to_string(), outcome));
            }
            debug!(chunk_size = chunk.len(), "Delivered chunk");
        }

        let report = DeliveryReport { outcomes };
        info!(
            delivered = report.delivered_count(),
            failed = report.failed_count(),
            "Delivery finished"
        );
        Ok(report)
    }

    /// Ensure the index described by `index` exists.
    pub async fn ensure_index(&self, index: &IndexConfig) -> Result<(), PipelineError> {
        bounded(
            self.config.operation_timeout,
            "ensure_index",
            self.client.ensure_index(index),
        )
        .await
    }

    /// Check if the search engine is healthy.
    pub async fn health_check(&self) -> Result<bool, PipelineError> {
        bounded(
            self.config.operation_timeout,
            "health_check",
            self.client.health_check(),
        )
        .await
    }
}
