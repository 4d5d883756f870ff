//! Dependency initialization and wiring for the catalog indexer.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Settings;
use crate::IndexingError;
use catalog_indexer_pipeline::{
    BatchExtractor, BulkDelivery, ChangeSetResolver, DocumentTransformer, LoaderConfig,
    Orchestrator, OrchestratorConfig, RetryPolicy,
};
use catalog_indexer_repository::{
    IndexConfig, JsonFileWatermarkStore, OpenSearchClient, PostgresSource, SearchIndexConfig,
    SearchIndexProvider, SourceRepository,
};
use catalog_indexer_shared::EntityKind;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Index definitions to create before the first pass.
    pub indexes: Vec<IndexConfig>,
}

impl Dependencies {
    /// Initialize all dependencies from `settings`.
    ///
    /// Neither the database nor the search engine has to be reachable yet;
    /// the orchestrator retries until they are.
    pub async fn new(settings: &Settings) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            state_file = %settings.state_file.display(),
            batch_size = settings.batch_size,
            "Initializing dependencies"
        );

        let indexes = EntityKind::ALL
            .into_iter()
            .map(|kind| IndexConfig::load(kind, settings.mappings_dir.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;

        let source: Arc<dyn SourceRepository> = Arc::new(PostgresSource::connect_lazy(
            &settings.database_url,
            settings.database_max_connections,
        )?);

        let search_client = OpenSearchClient::with_config(
            &settings.opensearch_url,
            SearchIndexConfig::with_max_bulk_items(settings.batch_size),
        )
        .await?;

        match search_client.health_check().await {
            Ok(true) => info!("OpenSearch connection verified"),
            Ok(false) => warn!("OpenSearch cluster is unhealthy"),
            Err(e) => warn!(error = %e, "OpenSearch is not reachable yet"),
        }

        let store = Arc::new(JsonFileWatermarkStore::new(&settings.state_file));

        let resolver =
            ChangeSetResolver::new(source.clone(), settings.batch_size, settings.operation_timeout);
        let extractor =
            BatchExtractor::new(source, settings.batch_size, settings.operation_timeout);
        let loader = BulkDelivery::with_config(
            Arc::new(search_client),
            LoaderConfig {
                chunk_size: settings.batch_size,
                operation_timeout: settings.operation_timeout,
            },
        );

        let orchestrator = Orchestrator::with_config(
            resolver,
            extractor,
            DocumentTransformer::new(),
            loader,
            store,
            OrchestratorConfig {
                poll_interval: settings.poll_interval,
                retry: RetryPolicy::new(settings.backoff),
                kinds: EntityKind::ALL.to_vec(),
            },
        );

        Ok(Self {
            orchestrator,
            indexes,
        })
    }
}
