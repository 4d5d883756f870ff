//! Orchestrator module for the catalog indexer pipeline.
//!
//! Runs one cycle per entity kind: load watermark, resolve, extract,
//! transform, deliver, commit. After every kind has run it waits for the poll
//! interval and starts over, until shut down.

mod progress;

pub use progress::CycleProgress;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::errors::PipelineError;
use crate::extractor::BatchExtractor;
use crate::loader::{BulkDelivery, DeliveryOutcome, DeliveryReport};
use crate::processor::DocumentTransformer;
use crate::resolver::ChangeSetResolver;
use crate::retry::RetryPolicy;
use catalog_indexer_repository::{IndexConfig, WatermarkStore};
use catalog_indexer_shared::{ChangedId, EntityKind, RelatedModified, Watermark};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wait between passes over all kinds.
    pub poll_interval: Duration,
    /// Retry policy wrapped around every cycle.
    pub retry: RetryPolicy,
    /// Kinds processed by each pass, in order.
    pub kinds: Vec<EntityKind>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            kinds: EntityKind::ALL.to_vec(),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummary {
    pub kind: EntityKind,
    /// Ids in the change set.
    pub resolved: usize,
    /// Positions confirmed (delivered or vanished).
    pub confirmed: usize,
    /// Positions that were malformed or rejected.
    pub failed: usize,
    /// The watermark written at the end of the cycle, if any.
    pub committed: Option<Watermark>,
}

/// How a position is settled once its page has been delivered.
enum Pending {
    Vanished,
    Malformed,
    Document(RelatedModified),
}

/// Orchestrator that coordinates the pipeline components.
pub struct Orchestrator {
    resolver: ChangeSetResolver,
    extractor: BatchExtractor,
    transformer: DocumentTransformer,
    loader: BulkDelivery,
    store: Arc<dyn WatermarkStore>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(
        resolver: ChangeSetResolver,
        extractor: BatchExtractor,
        transformer: DocumentTransformer,
        loader: BulkDelivery,
        store: Arc<dyn WatermarkStore>,
    ) -> Self {
        Self::with_config(
            resolver,
            extractor,
            transformer,
            loader,
            store,
            OrchestratorConfig::default(),
        )
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        resolver: ChangeSetResolver,
        extractor: BatchExtractor,
        transformer: DocumentTransformer,
        loader: BulkDelivery,
        store: Arc<dyn WatermarkStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            resolver,
            extractor,
            transformer,
            loader,
            store,
            config,
        }
    }

    /// Create every index in `indexes` that does not exist yet.
    pub async fn ensure_indexes(&self, indexes: &[IndexConfig]) -> Result<(), PipelineError> {
        for index in indexes {
            self.config
                .retry
                .retry("ensure_index", || self.loader.ensure_index(index))
                .await?;
        }
        Ok(())
    }

    /// Run passes until `ctrl-c` is received.
    pub async fn run(&self) -> Result<(), PipelineError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run passes until `shutdown` completes.
    ///
    /// Shutdown is honoured during a pass as well as during the wait; an
    /// interrupted cycle commits nothing and is repeated on the next start.
    #[instrument(skip(self, shutdown))]
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), PipelineError>
    where
        F: Future<Output = ()>,
    {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Starting catalog indexer orchestrator"
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.run_pass() => {
                    result?;
                }
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        info!("Orchestrator shutdown complete");
        Ok(())
    }

    /// Run one cycle for every configured kind, retrying each until it succeeds.
    pub async fn run_pass(&self) -> Result<Vec<CycleSummary>, PipelineError> {
        let mut summaries = Vec::with_capacity(self.config.kinds.len());
        for kind in &self.config.kinds {
            let kind = *kind;
            let summary = self
                .config
                .retry
                .retry(kind.as_str(), || self.run_cycle(kind))
                .await?;
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Run a single cycle for `kind`.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn run_cycle(&self, kind: EntityKind) -> Result<CycleSummary, PipelineError> {
        let previous = self.store.load().await.get(kind);
        let ceiling = self.resolver.related_ceiling(kind).await?;
        let mut progress = CycleProgress::with_ceiling(ceiling);
        let mut resolved = 0;
        let mut cursor: Option<ChangedId> = None;

        loop {
            let page = self
                .resolver
                .next_page(kind, &previous, cursor.as_ref())
                .await?;
            if page.ids.is_empty() {
                break;
            }
            resolved += page.ids.len();

            let rows = self.extractor.extract(kind, &page.ids).await?;

            let mut documents = Vec::with_capacity(rows.len());
            let mut pending = Vec::with_capacity(rows.len());
            for extracted in rows {
                let settle = match &extracted.row {
                    None => Pending::Vanished,
                    Some(row) => match self.transformer.transform(kind, row) {
                        Ok((document, related)) => {
                            documents.push(document);
                            Pending::Document(related)
                        }
                        Err(e) => {
                            warn!(id = %extracted.position.id, error = %e, "Skipping malformed row");
                            Pending::Malformed
                        }
                    },
                };
                pending.push((extracted.position, settle));
            }

            let report = if documents.is_empty() {
                DeliveryReport::default()
            } else {
                self.loader.deliver(&documents).await?
            };

            let mut outcomes = report.outcomes().iter();
            for (position, settle) in pending {
                match settle {
                    Pending::Vanished => progress.confirm(&position, RelatedModified::new()),
                    Pending::Malformed => progress.fail(&position),
                    Pending::Document(related) => match outcomes.next() {
                        Some((_, DeliveryOutcome::Delivered)) => progress.confirm(&position, related),
                        _ => progress.fail(&position),
                    },
                }
            }

            if page.exhausted {
                break;
            }
            cursor = page.cursor().cloned();
        }

        if resolved == 0 {
            info!("No changes");
            return Ok(CycleSummary {
                kind,
                resolved,
                confirmed: 0,
                failed: 0,
                committed: None,
            });
        }

        if let Some(failure) = progress.first_failure() {
            warn!(
                failed = progress.failed(),
                first_failed_id = %failure.id,
                "Cycle had failures, commit bounded"
            );
        }

        let committed = match progress.commit_value(&previous) {
            Some(next) if next != previous => {
                self.store.save(kind, &next).await?;
                Some(next)
            }
            _ => None,
        };

        info!(
            resolved = resolved,
            confirmed = progress.confirmed(),
            failed = progress.failed(),
            committed = committed.is_some(),
            "Cycle finished"
        );

        Ok(CycleSummary {
            kind,
            resolved,
            confirmed: progress.confirmed(),
            failed: progress.failed(),
            committed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoaderConfig;
    use async_trait::async_trait;
    use catalog_indexer_repository::memory::{CategoryRecord, PersonRecord, WorkRecord};
    use catalog_indexer_repository::{
        BulkItem, BulkItemResult, InMemorySource, InMemoryWatermarkStore, SearchIndexError,
        SearchIndexProvider, SourceError, SourceRepository,
    };
    use catalog_indexer_shared::{AggregatedRow, Role, WatermarkMap};
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::Value;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// Search index mock that keeps the last body upserted per id.
    #[derive(Default)]
    struct RecordingIndex {
        documents: Mutex<BTreeMap<(String, String), Value>>,
        reject: Mutex<HashSet<String>>,
        unavailable: AtomicBool,
        requests: AtomicUsize,
        ensured: Mutex<Vec<String>>,
    }

    impl RecordingIndex {
        fn reject(&self, id: &str) {
            self.reject.lock().unwrap().insert(id.to_string());
        }

        fn document(&self, index: &str, id: &str) -> Option<Value> {
            self.documents
                .lock()
                .unwrap()
                .get(&(index.to_string(), id.to_string()))
                .cloned()
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchIndexProvider for RecordingIndex {
        async fn ensure_index(&self, config: &IndexConfig) -> Result<(), SearchIndexError> {
            self.ensured.lock().unwrap().push(config.name.clone());
            Ok(())
        }

        async fn bulk_upsert(&self, items: &[BulkItem]) -> Result<Vec<BulkItemResult>, SearchIndexError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(SearchIndexError::connection("connection refused"));
            }

            let reject = self.reject.lock().unwrap().clone();
            let mut documents = self.documents.lock().unwrap();
            Ok(items
                .iter()
                .map(|item| {
                    if reject.contains(&item.id) {
                        BulkItemResult::failed(&item.id, "mapper_parsing_exception: rejected")
                    } else {
                        documents.insert(
                            (item.target_index.clone(), item.id.clone()),
                            item.body.clone(),
                        );
                        BulkItemResult::ok(&item.id)
                    }
                })
                .collect())
        }

        async fn health_check(&self) -> Result<bool, SearchIndexError> {
            Ok(true)
        }
    }

    /// Source whose rows for `hidden` ids disappear between resolve and extract.
    struct VanishingSource {
        inner: Arc<InMemorySource>,
        hidden: HashSet<String>,
    }

    #[async_trait]
    impl SourceRepository for VanishingSource {
        async fn changed_ids(
            &self,
            kind: EntityKind,
            watermark: &Watermark,
            after: Option<&ChangedId>,
            limit: usize,
        ) -> Result<Vec<ChangedId>, SourceError> {
            self.inner.changed_ids(kind, watermark, after, limit).await
        }

        async fn fetch_rows(
            &self,
            kind: EntityKind,
            ids: &[String],
        ) -> Result<Vec<AggregatedRow>, SourceError> {
            let rows = self.inner.fetch_rows(kind, ids).await?;
            Ok(rows
                .into_iter()
                .filter(|row| !self.hidden.contains(row.id()))
                .collect())
        }

        async fn max_modified(&self, kind: EntityKind) -> Result<Option<DateTime<Utc>>, SourceError> {
            self.inner.max_modified(kind).await
        }
    }

    /// Source that replaces a person right after the first work page is fetched.
    struct RenamingSource {
        inner: Arc<InMemorySource>,
        renamed: PersonRecord,
        done: AtomicBool,
    }

    #[async_trait]
    impl SourceRepository for RenamingSource {
        async fn changed_ids(
            &self,
            kind: EntityKind,
            watermark: &Watermark,
            after: Option<&ChangedId>,
            limit: usize,
        ) -> Result<Vec<ChangedId>, SourceError> {
            self.inner.changed_ids(kind, watermark, after, limit).await
        }

        async fn fetch_rows(
            &self,
            kind: EntityKind,
            ids: &[String],
        ) -> Result<Vec<AggregatedRow>, SourceError> {
            let rows = self.inner.fetch_rows(kind, ids).await?;
            if kind == EntityKind::Work && !self.done.swap(true, Ordering::SeqCst) {
                self.inner.upsert_person(self.renamed.clone()).await;
            }
            Ok(rows)
        }

        async fn max_modified(&self, kind: EntityKind) -> Result<Option<DateTime<Utc>>, SourceError> {
            self.inner.max_modified(kind).await
        }
    }

    struct Harness {
        source: Arc<InMemorySource>,
        index: Arc<RecordingIndex>,
        store: Arc<InMemoryWatermarkStore>,
        orchestrator: Orchestrator,
    }

    fn harness_with(
        source: Arc<InMemorySource>,
        repository: Arc<dyn SourceRepository>,
        store: Arc<InMemoryWatermarkStore>,
        page_size: usize,
    ) -> Harness {
        let index = Arc::new(RecordingIndex::default());
        let timeout = Duration::from_secs(30);
        let orchestrator = Orchestrator::with_config(
            ChangeSetResolver::new(repository.clone(), page_size, timeout),
            BatchExtractor::new(repository, page_size, timeout),
            DocumentTransformer::new(),
            BulkDelivery::with_config(
                index.clone(),
                LoaderConfig {
                    chunk_size: page_size,
                    operation_timeout: timeout,
                },
            ),
            store.clone(),
            OrchestratorConfig {
                poll_interval: Duration::from_secs(60),
                retry: RetryPolicy::default().with_max_attempts(3),
                kinds: EntityKind::ALL.to_vec(),
            },
        );
        Harness {
            source,
            index,
            store,
            orchestrator,
        }
    }

    fn harness(source: Arc<InMemorySource>) -> Harness {
        harness_with(
            source.clone(),
            source,
            Arc::new(InMemoryWatermarkStore::new()),
            500,
        )
    }

    /// One work with two actors and one category.
    async fn single_work() -> Arc<InMemorySource> {
        let source = Arc::new(InMemorySource::new());
        source.upsert_work(WorkRecord::new("w1", "Stalker", ts(100))).await;
        source.upsert_person(PersonRecord::new("p1", "Alisa Freindlich", ts(50))).await;
        source.upsert_person(PersonRecord::new("p2", "Nikolai Grinko", ts(70))).await;
        source.upsert_category(CategoryRecord::new("c1", "Drama", ts(30))).await;
        source.link_person("w1", "p1", Role::Actor).await;
        source.link_person("w1", "p2", Role::Actor).await;
        source.link_category("w1", "c1").await;
        source
    }

    async fn three_categories() -> Arc<InMemorySource> {
        let source = Arc::new(InMemorySource::new());
        source.upsert_category(CategoryRecord::new("c1", "Drama", ts(10))).await;
        source.upsert_category(CategoryRecord::new("c2", "Comedy", ts(20))).await;
        source.upsert_category(CategoryRecord::new("c3", "Horror", ts(30))).await;
        source
    }

    #[tokio::test]
    async fn test_epoch_cycle_builds_document_and_commits() {
        let h = harness(single_work().await);

        let summary = h.orchestrator.run_cycle(EntityKind::Work).await.unwrap();

        let doc = h.index.document("movies", "w1").unwrap();
        assert_eq!(
            doc["actors_names"],
            serde_json::json!(["Alisa Freindlich", "Nikolai Grinko"])
        );
        assert_eq!(doc["genre"], serde_json::json!(["Drama"]));

        let expected = Watermark::epoch()
            .with_own(ts(100))
            .with_related(EntityKind::Person, ts(70))
            .with_related(EntityKind::Category, ts(30));
        assert_eq!(summary.committed, Some(expected.clone()));
        assert_eq!(h.store.load().await.get(EntityKind::Work), expected);
    }

    #[tokio::test]
    async fn test_unchanged_source_makes_no_downstream_calls() {
        let h = harness(single_work().await);
        h.orchestrator.run_cycle(EntityKind::Work).await.unwrap();

        let fetches = h.source.fetch_rows_calls();
        let requests = h.index.requests();
        let saves = h.store.save_count();

        let summary = h.orchestrator.run_cycle(EntityKind::Work).await.unwrap();

        assert_eq!(summary.resolved, 0);
        assert_eq!(summary.committed, None);
        assert_eq!(h.source.fetch_rows_calls(), fetches);
        assert_eq!(h.index.requests(), requests);
        assert_eq!(h.store.save_count(), saves);
    }

    #[tokio::test]
    async fn test_rerun_from_same_watermark_is_idempotent() {
        let source = single_work().await;
        let first = harness(source.clone());
        let second = harness(source);

        first.orchestrator.run_pass().await.unwrap();
        second.orchestrator.run_pass().await.unwrap();

        assert_eq!(
            first.index.document("movies", "w1"),
            second.index.document("movies", "w1")
        );
        assert_eq!(
            first.index.document("persons", "p2"),
            second.index.document("persons", "p2")
        );
        assert_eq!(first.store.load().await, second.store.load().await);
    }

    #[tokio::test]
    async fn test_person_change_reindexes_work() {
        let h = harness(single_work().await);
        h.orchestrator.run_pass().await.unwrap();

        h.source
            .upsert_person(PersonRecord::new("p1", "Alisa B. Freindlich", ts(200)))
            .await;
        let summaries = h.orchestrator.run_pass().await.unwrap();

        let work = &summaries[0];
        assert_eq!(work.kind, EntityKind::Work);
        assert_eq!(work.resolved, 1);
        let committed = work.committed.as_ref().unwrap();
        assert_eq!(committed.own(), Some(ts(100)));
        assert_eq!(committed.related(EntityKind::Person), Some(ts(200)));

        let doc = h.index.document("movies", "w1").unwrap();
        assert_eq!(doc["actors_names"][0], "Alisa B. Freindlich");

        let person = h.index.document("persons", "p1").unwrap();
        assert_eq!(person["full_name"], "Alisa B. Freindlich");
    }

    #[tokio::test]
    async fn test_watermark_never_moves_backwards() {
        let source = single_work().await;
        let mut ahead = WatermarkMap::new();
        ahead.insert(EntityKind::Work, Watermark::epoch().with_own(ts(500)));
        let store = Arc::new(InMemoryWatermarkStore::with_watermarks(ahead));
        let h = harness_with(source.clone(), source, store, 500);

        // selected through its related entities only
        let summary = h.orchestrator.run_cycle(EntityKind::Work).await.unwrap();

        assert_eq!(summary.resolved, 1);
        let committed = h.store.load().await.get(EntityKind::Work);
        assert_eq!(committed.own(), Some(ts(500)));
        assert_eq!(committed.related(EntityKind::Person), Some(ts(70)));
        assert_eq!(committed.related(EntityKind::Category), Some(ts(30)));
    }

    #[tokio::test]
    async fn test_partial_failure_commits_up_to_first_failure() {
        let h = harness(three_categories().await);
        h.index.reject("c2");

        let summary = h.orchestrator.run_cycle(EntityKind::Category).await.unwrap();

        assert_eq!(summary.confirmed, 2);
        assert_eq!(summary.failed, 1);
        assert!(h.index.document("genres", "c1").is_some());
        assert!(h.index.document("genres", "c2").is_none());
        assert!(h.index.document("genres", "c3").is_some());
        assert_eq!(h.store.load().await.get(EntityKind::Category).own(), Some(ts(10)));

        // the rejected document is picked up again once the index accepts it
        h.index.reject.lock().unwrap().clear();
        let retry = h.orchestrator.run_cycle(EntityKind::Category).await.unwrap();
        assert_eq!(retry.resolved, 2);
        assert!(h.index.document("genres", "c2").is_some());
        assert_eq!(h.store.load().await.get(EntityKind::Category).own(), Some(ts(30)));
    }

    #[tokio::test]
    async fn test_failure_tied_with_confirmed_document_is_not_skipped() {
        let source = Arc::new(InMemorySource::new());
        source.upsert_category(CategoryRecord::new("c1", "Drama", ts(10))).await;
        source.upsert_category(CategoryRecord::new("c2", "Comedy", ts(10))).await;
        let h = harness(source);
        h.index.reject("c2");

        let summary = h.orchestrator.run_cycle(EntityKind::Category).await.unwrap();

        assert_eq!(summary.committed, None);
        assert_eq!(h.store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_propagation_keeps_related_watermark() {
        let h = harness(single_work().await);
        h.orchestrator.run_cycle(EntityKind::Work).await.unwrap();

        h.source
            .upsert_person(PersonRecord::new("p2", "N. Grinko", ts(300)))
            .await;
        h.index.reject("w1");
        let summary = h.orchestrator.run_cycle(EntityKind::Work).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.committed, None);
        assert_eq!(
            h.store.load().await.get(EntityKind::Work).related(EntityKind::Person),
            Some(ts(70))
        );
    }

    #[tokio::test]
    async fn test_malformed_row_bounds_the_commit() {
        let source = three_categories().await;
        let mut blank = CategoryRecord::new("c2", "", ts(20));
        blank.name = None;
        source.upsert_category(blank).await;
        let h = harness(source);

        let summary = h.orchestrator.run_cycle(EntityKind::Category).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(h.index.document("genres", "c3").is_some());
        assert_eq!(h.store.load().await.get(EntityKind::Category).own(), Some(ts(10)));
    }

    #[tokio::test]
    async fn test_vanished_rows_count_as_processed() {
        let source = three_categories().await;
        let vanishing = Arc::new(VanishingSource {
            inner: source.clone(),
            hidden: ["c3".to_string()].into_iter().collect(),
        });
        let h = harness_with(
            source,
            vanishing,
            Arc::new(InMemoryWatermarkStore::new()),
            500,
        );

        let summary = h.orchestrator.run_cycle(EntityKind::Category).await.unwrap();

        assert_eq!(summary.confirmed, 3);
        assert!(h.index.document("genres", "c3").is_none());
        assert_eq!(h.store.load().await.get(EntityKind::Category).own(), Some(ts(30)));
    }

    #[tokio::test]
    async fn test_related_change_during_cycle_is_picked_up_next_cycle() {
        let source = Arc::new(InMemorySource::new());
        source.upsert_work(WorkRecord::new("w1", "Stalker", ts(10))).await;
        source.upsert_work(WorkRecord::new("w2", "Solaris", ts(20))).await;
        source.upsert_person(PersonRecord::new("p1", "Original", ts(5))).await;
        source.link_person("w1", "p1", Role::Actor).await;
        source.link_person("w2", "p1", Role::Actor).await;

        let renaming = Arc::new(RenamingSource {
            inner: source.clone(),
            renamed: PersonRecord::new("p1", "Renamed", ts(999)),
            done: AtomicBool::new(false),
        });
        let h = harness_with(
            source,
            renaming,
            Arc::new(InMemoryWatermarkStore::new()),
            1,
        );

        let first = h.orchestrator.run_cycle(EntityKind::Work).await.unwrap();
        assert_eq!(first.resolved, 2);
        let committed = first.committed.unwrap();
        assert_eq!(committed.own(), Some(ts(20)));
        assert_eq!(committed.related(EntityKind::Person), Some(ts(5)));
        assert_eq!(
            h.index.document("movies", "w1").unwrap()["actors_names"],
            serde_json::json!(["Original"])
        );

        let second = h.orchestrator.run_cycle(EntityKind::Work).await.unwrap();
        assert_eq!(second.resolved, 2);
        for id in ["w1", "w2"] {
            assert_eq!(
                h.index.document("movies", id).unwrap()["actors_names"],
                serde_json::json!(["Renamed"])
            );
        }
        assert_eq!(
            h.store.load().await.get(EntityKind::Work).related(EntityKind::Person),
            Some(ts(999))
        );
    }

    #[tokio::test]
    async fn test_total_failure_makes_no_progress() {
        let h = harness(three_categories().await);
        h.index.unavailable.store(true, Ordering::SeqCst);

        let result = h.orchestrator.run_cycle(EntityKind::Category).await;

        assert!(matches!(result, Err(PipelineError::SearchError(_))));
        assert_eq!(h.store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_all_documents_rejected_makes_no_progress() {
        let h = harness(three_categories().await);
        for id in ["c1", "c2", "c3"] {
            h.index.reject(id);
        }

        let summary = h.orchestrator.run_cycle(EntityKind::Category).await.unwrap();

        assert_eq!(summary.failed, 3);
        assert_eq!(h.store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_spans_multiple_pages() {
        let source = three_categories().await;
        let h = harness_with(
            source.clone(),
            source,
            Arc::new(InMemoryWatermarkStore::new()),
            2,
        );

        let summary = h.orchestrator.run_cycle(EntityKind::Category).await.unwrap();

        assert_eq!(summary.resolved, 3);
        assert_eq!(h.index.requests(), 2);
        assert_eq!(h.store.save_count(), 1);
        assert_eq!(h.store.load().await.get(EntityKind::Category).own(), Some(ts(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_pass_retries_transient_failures() {
        let h = harness(three_categories().await);
        h.source.fail_next(2);

        let summaries = h.orchestrator.run_pass().await.unwrap();

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[2].kind, EntityKind::Category);
        assert_eq!(summaries[2].resolved, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_polls_and_stops() {
        let h = harness(single_work().await);

        h.orchestrator
            .run_until(tokio::time::sleep(Duration::from_secs(90)))
            .await
            .unwrap();

        // two passes, at 0s and 60s; only the first one had changes
        assert_eq!(h.source.changed_ids_calls(), 6);
        assert_eq!(h.store.save_count(), 3);
    }

    #[tokio::test]
    async fn test_ensure_indexes() {
        let h = harness(Arc::new(InMemorySource::new()));
        let indexes: Vec<IndexConfig> = EntityKind::ALL
            .into_iter()
            .map(|kind| IndexConfig::embedded(kind).unwrap())
            .collect();

        h.orchestrator.ensure_indexes(&indexes).await.unwrap();

        assert_eq!(
            *h.index.ensured.lock().unwrap(),
            vec!["movies", "persons", "genres"]
        );
    }
}
