//! Change-set resolution.
//!
//! Computes which ids of a kind must be re-delivered since a watermark,
//! either because the entity itself changed or because a related entity it
//! embeds did. Ids are emitted in traversal order, `(modified, id)`
//! ascending, one bounded page at a time.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::deadline::bounded;
use crate::errors::PipelineError;
use catalog_indexer_repository::SourceRepository;
use catalog_indexer_shared::{ChangedId, EntityKind, RelatedModified, Watermark};

/// One page of a change set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangePage {
    /// Ids in traversal order, without duplicates.
    pub ids: Vec<ChangedId>,
    /// No further pages follow.
    pub exhausted: bool,
}

impl ChangePage {
    /// Keyset cursor for the next page.
    pub fn cursor(&self) -> Option<&ChangedId> {
        self.ids.last()
    }
}

/// Resolves change sets against the relational source.
pub struct ChangeSetResolver {
    source: Arc<dyn SourceRepository>,
    page_size: usize,
    operation_timeout: Duration,
}

impl ChangeSetResolver {
    pub fn new(source: Arc<dyn SourceRepository>, page_size: usize, operation_timeout: Duration) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            operation_timeout,
        }
    }

    /// The page of changed ids following `after` (or the first page).
    #[instrument(skip(self, watermark, after), fields(kind = %kind))]
    pub async fn next_page(
        &self,
        kind: EntityKind,
        watermark: &Watermark,
        after: Option<&ChangedId>,
    ) -> Result<ChangePage, PipelineError> {
        let raw = bounded(
            self.operation_timeout,
            "changed_ids",
            self.source.changed_ids(kind, watermark, after, self.page_size),
        )
        .await?;

        let exhausted = raw.len() < self.page_size;
        let ids = dedupe(raw);
        debug!(count = ids.len(), exhausted = exhausted, "Resolved change page");

        Ok(ChangePage { ids, exhausted })
    }

    /// Latest `modified` of every kind related to `kind`, read before the
    /// first page of a cycle.
    ///
    /// Related components committed by the cycle never exceed these values,
    /// so a related row changed while the cycle runs is still newer than the
    /// committed watermark and its dependents are selected again.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn related_ceiling(&self, kind: EntityKind) -> Result<RelatedModified, PipelineError> {
        let mut ceiling = RelatedModified::new();
        for related in kind.related_kinds() {
            let latest = bounded(
                self.operation_timeout,
                "max_modified",
                self.source.max_modified(*related),
            )
            .await?;
            if let Some(latest) = latest {
                ceiling.observe(*related, latest);
            }
        }
        Ok(ceiling)
    }

    /// The whole change set of `kind` since `watermark`.
    pub async fn resolve(
        &self,
        kind: EntityKind,
        watermark: &Watermark,
    ) -> Result<Vec<ChangedId>, PipelineError> {
        let mut resolved: Vec<ChangedId> = Vec::new();
        loop {
            let page = self.next_page(kind, watermark, resolved.last()).await?;
            let exhausted = page.exhausted || page.ids.is_empty();
            resolved.extend(page.ids);
            if exhausted {
                break;
            }
        }
        Ok(dedupe(resolved))
    }
}

/// Order ids by `(modified, id)` and keep the first occurrence of each id.
fn dedupe(mut ids: Vec<ChangedId>) -> Vec<ChangedId> {
    ids.sort();
    let mut seen = HashSet::with_capacity(ids.len());
    ids.retain(|changed| seen.insert(changed.id.clone()));
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_indexer_repository::memory::{CategoryRecord, PersonRecord, WorkRecord};
    use catalog_indexer_repository::{InMemorySource, SourceError};
    use catalog_indexer_shared::{AggregatedRow, Role};
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn resolver(source: Arc<InMemorySource>, page_size: usize) -> ChangeSetResolver {
        ChangeSetResolver::new(source, page_size, Duration::from_secs(30))
    }

    async fn catalog() -> Arc<InMemorySource> {
        let source = Arc::new(InMemorySource::new());
        source.upsert_work(WorkRecord::new("w1", "Stalker", ts(10))).await;
        source.upsert_work(WorkRecord::new("w2", "Solaris", ts(20))).await;
        source.upsert_work(WorkRecord::new("w3", "Mirror", ts(20))).await;
        source.upsert_person(PersonRecord::new("p1", "Anatoly Solonitsyn", ts(5))).await;
        source.upsert_category(CategoryRecord::new("c1", "Drama", ts(5))).await;
        source.link_person("w1", "p1", Role::Actor).await;
        source.link_person("w2", "p1", Role::Actor).await;
        source.link_category("w3", "c1").await;
        source
    }

    #[tokio::test]
    async fn test_resolve_from_epoch_in_traversal_order() {
        let source = catalog().await;

        let ids = resolver(source, 500)
            .resolve(EntityKind::Work, &Watermark::epoch())
            .await
            .unwrap();

        let ids: Vec<&str> = ids.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w2", "w3"]);
    }

    #[tokio::test]
    async fn test_person_change_propagates_to_works() {
        let source = catalog().await;
        let watermark = Watermark::epoch()
            .with_own(ts(20))
            .with_related(EntityKind::Person, ts(5))
            .with_related(EntityKind::Category, ts(5));

        let resolver = resolver(source.clone(), 500);
        assert!(resolver
            .resolve(EntityKind::Work, &watermark)
            .await
            .unwrap()
            .is_empty());

        source.upsert_person(PersonRecord::new("p1", "A. Solonitsyn", ts(30))).await;

        let ids = resolver.resolve(EntityKind::Work, &watermark).await.unwrap();
        let ids: Vec<&str> = ids.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w2"]);
    }

    #[tokio::test]
    async fn test_resolve_drains_all_pages() {
        let source = catalog().await;
        let resolver = resolver(source.clone(), 1);

        let ids = resolver.resolve(EntityKind::Work, &Watermark::epoch()).await.unwrap();

        assert_eq!(ids.len(), 3);
        // three full pages, then an empty one
        assert_eq!(source.changed_ids_calls(), 4);
    }

    #[tokio::test]
    async fn test_next_page_marks_short_page_exhausted() {
        let source = catalog().await;
        let resolver = resolver(source, 2);

        let first = resolver
            .next_page(EntityKind::Work, &Watermark::epoch(), None)
            .await
            .unwrap();
        assert_eq!(first.ids.len(), 2);
        assert!(!first.exhausted);

        let second = resolver
            .next_page(EntityKind::Work, &Watermark::epoch(), first.cursor())
            .await
            .unwrap();
        assert_eq!(second.ids.len(), 1);
        assert_eq!(second.ids[0].id, "w3");
        assert!(second.exhausted);
    }

    #[tokio::test]
    async fn test_related_ceiling_reads_related_tables() {
        let source = catalog().await;
        let resolver = resolver(source, 500);

        let works = resolver.related_ceiling(EntityKind::Work).await.unwrap();
        assert_eq!(works.get(EntityKind::Person), Some(ts(5)));
        assert_eq!(works.get(EntityKind::Category), Some(ts(5)));

        let persons = resolver.related_ceiling(EntityKind::Person).await.unwrap();
        assert_eq!(persons.get(EntityKind::Work), Some(ts(20)));

        assert!(resolver.related_ceiling(EntityKind::Category).await.unwrap().is_empty());
    }

    struct DuplicatingSource;

    #[async_trait]
    impl SourceRepository for DuplicatingSource {
        async fn changed_ids(
            &self,
            _kind: EntityKind,
            _watermark: &Watermark,
            _after: Option<&ChangedId>,
            _limit: usize,
        ) -> Result<Vec<ChangedId>, SourceError> {
            Ok(vec![
                ChangedId::new("b", ts(2)),
                ChangedId::new("a", ts(1)),
                ChangedId::new("b", ts(2)),
            ])
        }

        async fn fetch_rows(
            &self,
            _kind: EntityKind,
            _ids: &[String],
        ) -> Result<Vec<AggregatedRow>, SourceError> {
            Ok(Vec::new())
        }

        async fn max_modified(
            &self,
            _kind: EntityKind,
        ) -> Result<Option<DateTime<Utc>>, SourceError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_duplicates_are_removed() {
        let resolver = ChangeSetResolver::new(Arc::new(DuplicatingSource), 10, Duration::from_secs(1));

        let page = resolver
            .next_page(EntityKind::Work, &Watermark::epoch(), None)
            .await
            .unwrap();

        assert_eq!(page.ids, vec![ChangedId::new("a", ts(1)), ChangedId::new("b", ts(2))]);
        assert!(page.exhausted);
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let source = catalog().await;
        source.fail_next(1);

        let result = resolver(source, 500)
            .resolve(EntityKind::Category, &Watermark::epoch())
            .await;
        assert!(matches!(result, Err(PipelineError::SourceError(_))));
    }
}
