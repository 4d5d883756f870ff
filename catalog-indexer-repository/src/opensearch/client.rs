//! `SearchIndexProvider` over a single OpenSearch node.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, OpenSearch,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::SearchIndexConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::IndexConfig;
use crate::types::{BulkItem, BulkItemResult};

/// Bulk writer and index bootstrapper for the catalog indexes.
///
/// # Example
///
/// ```ignore
/// use catalog_indexer_repository::opensearch::{IndexConfig, OpenSearchClient};
/// let client = OpenSearchClient::new("http://localhost:9200").await?;
/// client.ensure_index(&IndexConfig::embedded(EntityKind::Work)?).await?;
/// let results = client.bulk_upsert(&items).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    config: SearchIndexConfig,
}

impl OpenSearchClient {
    /// Client for the node at `url` with default limits.
    ///
    /// Fails with a connection error when `url` does not parse; no request
    /// is sent until the first call.
    pub async fn new(url: &str) -> Result<Self, SearchIndexError> {
        Self::with_config(url, SearchIndexConfig::default()).await
    }

    /// Client for the node at `url` with explicit limits.
    pub async fn with_config(url: &str, config: SearchIndexConfig) -> Result<Self, SearchIndexError> {
        let node = Url::parse(url).map_err(unreachable_node)?;
        let transport = TransportBuilder::new(SingleNodeConnectionPool::new(node))
            .disable_proxy()
            .build()
            .map_err(unreachable_node)?;
        let client = OpenSearch::new(transport);

        info!(url = %url, max_bulk_items = ?config.max_bulk_items, "Created OpenSearch client");

        Ok(Self { client, config })
    }

    /// Build the newline-delimited body of a `_bulk` request.
    fn bulk_body(items: &[BulkItem]) -> Vec<JsonBody<Value>> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(items.len() * 2);
        for item in items {
            body.push(item.action_line().into());
            body.push(item.body.clone().into());
        }
        body
    }

    /// Map a `_bulk` response onto the submitted items.
    ///
    /// The response lists one entry per item in submission order; an entry
    /// carrying an `error` object is a rejected item.
    fn parse_bulk_response(
        items: &[BulkItem],
        response: &Value,
    ) -> Result<Vec<BulkItemResult>, SearchIndexError> {
        let entries = response
            .get("items")
            .and_then(|i| i.as_array())
            .ok_or_else(|| SearchIndexError::parse("bulk response has no items array"))?;

        if entries.len() != items.len() {
            return Err(SearchIndexError::parse(format!(
                "bulk response has {} items, expected {}",
                entries.len(),
                items.len()
            )));
        }

        let results = items
            .iter()
            .zip(entries)
            .map(|(item, entry)| {
                let outcome = entry.get(item.operation.as_str()).unwrap_or(entry);
                match outcome.get("error") {
                    Some(err) => {
                        let reason = err
                            .get("reason")
                            .and_then(|r| r.as_str())
                            .map(str::to_string)
                            .unwrap_or_else(|| err.to_string());
                        let kind = err.get("type").and_then(|t| t.as_str()).unwrap_or("error");
                        BulkItemResult::failed(&item.id, format!("{}: {}", kind, reason))
                    }
                    None => BulkItemResult::ok(&item.id),
                }
            })
            .collect();

        Ok(results)
    }
}

fn unreachable_node(e: impl std::fmt::Display) -> SearchIndexError {
    SearchIndexError::connection(e.to_string())
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    /// Create the index if it doesn't exist.
    ///
    /// A concurrent creation (`resource_already_exists_exception`) is treated
    /// as success.
    #[instrument(skip(self, config), fields(index = %config.name))]
    async fn ensure_index(&self, config: &IndexConfig) -> Result<(), SearchIndexError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[config.name.as_str()]))
            .send()
            .await
            .map_err(unreachable_node)?;

        if exists.status_code().is_success() {
            debug!("Index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&config.name))
            .body(config.settings.clone())
            .send()
            .await
            .map_err(unreachable_node)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("resource_already_exists_exception") {
                debug!("Index was created concurrently");
                return Ok(());
            }
            error!(status = %status, body = %body, "Index creation failed");
            return Err(SearchIndexError::index_creation(format!(
                "Creating {} failed with status {}: {}",
                config.name, status, body
            )));
        }

        info!(kind = %config.kind, "Created index");
        Ok(())
    }

    /// Upsert documents with a single `_bulk` request.
    ///
    /// Per-item rejections are returned as failed results; only transport
    /// errors, non-2xx statuses and unreadable responses fail the call.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    async fn bulk_upsert(&self, items: &[BulkItem]) -> Result<Vec<BulkItemResult>, SearchIndexError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        self.config.check_bulk_size(items.len())?;

        if let Some(item) = items.iter().find(|item| item.id.is_empty()) {
            return Err(SearchIndexError::validation(format!(
                "empty document id in bulk request for {}",
                item.target_index
            )));
        }

        let response = self
            .client
            .bulk(BulkParts::None)
            .body(Self::bulk_body(items))
            .send()
            .await
            .map_err(unreachable_node)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Bulk request failed");
            return Err(SearchIndexError::bulk_operation(format!(
                "Bulk request returned {}: {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let results = Self::parse_bulk_response(items, &body)?;
        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            warn!(failed = failed, total = results.len(), "Bulk request had rejected items");
        } else {
            debug!(total = results.len(), "Bulk request succeeded");
        }

        Ok(results)
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(unreachable_node)?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(matches!(
            body.get("status").and_then(|s| s.as_str()),
            Some("green") | Some("yellow")
        ))
    }
}
