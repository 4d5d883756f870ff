//! Per-cycle progress and the watermark it allows to commit.

use chrono::{DateTime, Utc};

use catalog_indexer_shared::{ChangedId, RelatedModified, Watermark};

/// Accumulates the outcome of every position a cycle visits, in traversal
/// order, and derives the watermark the cycle may commit.
///
/// A position is confirmed once its document is in the index or its row no
/// longer exists. The first failed position bounds the own component: only
/// confirmed positions before it count, and a confirmed value equal to the
/// failed position's `modified` is not used, since advancing to it would skip
/// the failed entity. Related components are committed only by cycles
/// without failures, and never above the ceiling read when the cycle started.
#[derive(Debug, Clone, Default)]
pub struct CycleProgress {
    confirmed: usize,
    failed: usize,
    /// Latest confirmed `modified` before the first failure.
    latest: Option<DateTime<Utc>>,
    /// Latest confirmed `modified` strictly below `latest`.
    below_latest: Option<DateTime<Utc>>,
    first_failure: Option<ChangedId>,
    related: RelatedModified,
    ceiling: Option<RelatedModified>,
}

impl CycleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress whose related components are clamped to `ceiling`.
    pub fn with_ceiling(ceiling: RelatedModified) -> Self {
        Self {
            ceiling: Some(ceiling),
            ..Self::default()
        }
    }

    /// Record a position whose document was delivered, or whose row vanished.
    pub fn confirm(&mut self, position: &ChangedId, related: RelatedModified) {
        self.confirmed += 1;
        self.related = std::mem::take(&mut self.related).merge(related);

        if self.first_failure.is_some() {
            return;
        }
        match self.latest {
            Some(latest) if position.modified > latest => {
                self.below_latest = Some(latest);
                self.latest = Some(position.modified);
            }
            Some(_) => {}
            None => self.latest = Some(position.modified),
        }
    }

    /// Record a position whose row was malformed or whose document was rejected.
    pub fn fail(&mut self, position: &ChangedId) {
        self.failed += 1;
        if self.first_failure.is_none() {
            self.first_failure = Some(position.clone());
        }
    }

    pub fn confirmed(&self) -> usize {
        self.confirmed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn first_failure(&self) -> Option<&ChangedId> {
        self.first_failure.as_ref()
    }

    /// The watermark this cycle established, before merging with the previous one.
    ///
    /// `None` when nothing was confirmed ahead of the first failure.
    pub fn candidate(&self) -> Option<Watermark> {
        let own = match &self.first_failure {
            None => self.latest,
            Some(failure) if self.latest == Some(failure.modified) => self.below_latest,
            Some(_) => self.latest,
        }?;

        let mut candidate = Watermark::epoch().with_own(own);
        if self.first_failure.is_none() {
            let related = match &self.ceiling {
                Some(ceiling) => self.related.capped(ceiling),
                None => self.related.clone(),
            };
            for (kind, modified) in related.iter() {
                candidate = candidate.with_related(kind, modified);
            }
        }
        Some(candidate)
    }

    /// The value to commit on top of `previous`, if any.
    pub fn commit_value(&self, previous: &Watermark) -> Option<Watermark> {
        self.candidate().map(|candidate| previous.advance(&candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_shared::EntityKind;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn related(person: i64) -> RelatedModified {
        let mut related = RelatedModified::new();
        related.observe(EntityKind::Person, ts(person));
        related
    }

    #[test]
    fn test_all_confirmed_commits_every_component() {
        let mut progress = CycleProgress::new();
        progress.confirm(&ChangedId::new("a", ts(10)), related(5));
        progress.confirm(&ChangedId::new("b", ts(20)), related(7));

        let candidate = progress.candidate().unwrap();
        assert_eq!(candidate.own(), Some(ts(20)));
        assert_eq!(candidate.related(EntityKind::Person), Some(ts(7)));
    }

    #[test]
    fn test_failure_bounds_own_and_drops_related() {
        let mut progress = CycleProgress::new();
        progress.confirm(&ChangedId::new("a", ts(10)), related(5));
        progress.fail(&ChangedId::new("b", ts(20)));
        progress.confirm(&ChangedId::new("c", ts(30)), related(9));

        let candidate = progress.candidate().unwrap();
        assert_eq!(candidate.own(), Some(ts(10)));
        assert_eq!(candidate.related(EntityKind::Person), None);
        assert_eq!(progress.confirmed(), 2);
        assert_eq!(progress.failed(), 1);
        assert_eq!(progress.first_failure().unwrap().id, "b");
    }

    #[test]
    fn test_failure_tied_with_confirmed_value() {
        let mut progress = CycleProgress::new();
        progress.confirm(&ChangedId::new("a", ts(10)), RelatedModified::new());
        progress.confirm(&ChangedId::new("b", ts(20)), RelatedModified::new());
        progress.confirm(&ChangedId::new("c", ts(20)), RelatedModified::new());
        progress.fail(&ChangedId::new("d", ts(20)));

        assert_eq!(progress.candidate().unwrap().own(), Some(ts(10)));
    }

    #[test]
    fn test_nothing_confirmed_before_failure() {
        let mut progress = CycleProgress::new();
        progress.fail(&ChangedId::new("a", ts(10)));
        progress.confirm(&ChangedId::new("b", ts(20)), RelatedModified::new());

        assert!(progress.candidate().is_none());
        assert!(progress.commit_value(&Watermark::epoch()).is_none());
    }

    #[test]
    fn test_tie_with_only_confirmed_value() {
        let mut progress = CycleProgress::new();
        progress.confirm(&ChangedId::new("a", ts(10)), RelatedModified::new());
        progress.fail(&ChangedId::new("b", ts(10)));

        assert!(progress.candidate().is_none());
    }

    #[test]
    fn test_commit_value_never_moves_backwards() {
        let mut progress = CycleProgress::new();
        progress.confirm(&ChangedId::new("a", ts(10)), related(5));

        let previous = Watermark::epoch()
            .with_own(ts(50))
            .with_related(EntityKind::Person, ts(1));
        let committed = progress.commit_value(&previous).unwrap();

        assert_eq!(committed.own(), Some(ts(50)));
        assert_eq!(committed.related(EntityKind::Person), Some(ts(5)));
        assert!(committed.is_at_least(&previous));
    }

    #[test]
    fn test_related_components_clamped_to_ceiling() {
        let mut ceiling = RelatedModified::new();
        ceiling.observe(EntityKind::Person, ts(5));
        let mut progress = CycleProgress::with_ceiling(ceiling);
        progress.confirm(&ChangedId::new("a", ts(10)), related(5));
        progress.confirm(&ChangedId::new("b", ts(20)), related(999));

        let candidate = progress.candidate().unwrap();
        assert_eq!(candidate.own(), Some(ts(20)));
        assert_eq!(candidate.related(EntityKind::Person), Some(ts(5)));
    }

    #[test]
    fn test_empty_progress_commits_nothing() {
        assert!(CycleProgress::new().candidate().is_none());
    }
}
