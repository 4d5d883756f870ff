//! Watermarks and the values folded into them.
//!
//! A watermark records, per entity kind, how far propagation has progressed:
//! the kind's own `modified` position plus, for kinds with relations, the
//! latest `modified` value of every related kind that has been reflected in
//! delivered documents.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kind::EntityKind;

/// Key used for the kind's own component in the persisted form.
const OWN_FIELD: &str = "own";

/// Position of an entity in a cycle's traversal order.
///
/// Ordering is `(modified, id)`, the same order the resolver emits ids in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangedId {
    pub modified: DateTime<Utc>,
    pub id: String,
}

impl ChangedId {
    pub fn new(id: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            modified,
            id: id.into(),
        }
    }
}

/// Maximum `modified` value observed per related kind.
///
/// Produced by the transformer for each row and reduced by the caller with
/// [`RelatedModified::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedModified(BTreeMap<EntityKind, DateTime<Utc>>);

impl RelatedModified {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed timestamp for `kind`.
    pub fn observe(&mut self, kind: EntityKind, modified: DateTime<Utc>) {
        self.0
            .entry(kind)
            .and_modify(|current| {
                if modified > *current {
                    *current = modified;
                }
            })
            .or_insert(modified);
    }

    /// Record every timestamp in `values` for `kind`.
    pub fn observe_all<'a>(
        &mut self,
        kind: EntityKind,
        values: impl IntoIterator<Item = &'a DateTime<Utc>>,
    ) {
        for value in values {
            self.observe(kind, *value);
        }
    }

    /// Combine two folds, keeping the maximum per kind.
    pub fn merge(mut self, other: RelatedModified) -> RelatedModified {
        for (kind, modified) in other.0 {
            self.observe(kind, modified);
        }
        self
    }

    pub fn get(&self, kind: EntityKind) -> Option<DateTime<Utc>> {
        self.0.get(&kind).copied()
    }

    /// Clamp every component to the matching component of `ceiling`.
    ///
    /// Kinds without a ceiling value are dropped.
    pub fn capped(&self, ceiling: &RelatedModified) -> RelatedModified {
        RelatedModified(
            self.0
                .iter()
                .filter_map(|(kind, modified)| {
                    ceiling.get(*kind).map(|limit| (*kind, (*modified).min(limit)))
                })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, DateTime<Utc>)> + '_ {
        self.0.iter().map(|(kind, modified)| (*kind, *modified))
    }
}

/// Progress marker for one entity kind.
///
/// Missing components mean "since the beginning of time".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark {
    own: Option<DateTime<Utc>>,
    related: BTreeMap<EntityKind, DateTime<Utc>>,
}

impl Watermark {
    /// A watermark that selects everything.
    pub fn epoch() -> Self {
        Self::default()
    }

    pub fn with_own(mut self, modified: DateTime<Utc>) -> Self {
        self.own = Some(modified);
        self
    }

    pub fn with_related(mut self, kind: EntityKind, modified: DateTime<Utc>) -> Self {
        self.related.insert(kind, modified);
        self
    }

    pub fn own(&self) -> Option<DateTime<Utc>> {
        self.own
    }

    pub fn related(&self, kind: EntityKind) -> Option<DateTime<Utc>> {
        self.related.get(&kind).copied()
    }

    /// Own component, or the Unix epoch when absent.
    pub fn own_or_epoch(&self) -> DateTime<Utc> {
        self.own.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Related component for `kind`, or the Unix epoch when absent.
    pub fn related_or_epoch(&self, kind: EntityKind) -> DateTime<Utc> {
        self.related(kind).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn is_epoch(&self) -> bool {
        self.own.is_none() && self.related.is_empty()
    }

    /// Component-wise maximum of `self` and `candidate`.
    ///
    /// Committing always goes through this so no component ever moves backwards.
    pub fn advance(&self, candidate: &Watermark) -> Watermark {
        let own = match (self.own, candidate.own) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        let mut related = self.related.clone();
        for (kind, modified) in &candidate.related {
            related
                .entry(*kind)
                .and_modify(|current| {
                    if *modified > *current {
                        *current = *modified;
                    }
                })
                .or_insert(*modified);
        }

        Watermark { own, related }
    }

    /// True when no component of `self` is behind the matching component of `other`.
    pub fn is_at_least(&self, other: &Watermark) -> bool {
        let own_ok = match (self.own, other.own) {
            (_, None) => true,
            (Some(a), Some(b)) => a >= b,
            (None, Some(_)) => false,
        };
        own_ok
            && other
                .related
                .iter()
                .all(|(kind, modified)| self.related(*kind).is_some_and(|m| m >= *modified))
    }

    /// Persisted representation for a watermark of `kind`.
    ///
    /// Kinds without relations are stored as a bare timestamp, the others as an
    /// object of named timestamp fields. Returns `None` when there is nothing
    /// to store.
    pub fn to_stored(&self, kind: EntityKind) -> Option<StoredWatermark> {
        if kind.related_kinds().is_empty() {
            return self.own.map(StoredWatermark::Scalar);
        }

        if self.is_epoch() {
            return None;
        }

        let mut fields = BTreeMap::new();
        if let Some(own) = self.own {
            fields.insert(OWN_FIELD.to_string(), own);
        }
        for (related, modified) in &self.related {
            fields.insert(related.as_str().to_string(), *modified);
        }
        Some(StoredWatermark::Fields(fields))
    }

    /// Rebuild a watermark from its persisted representation.
    pub fn from_stored(stored: StoredWatermark) -> Result<Watermark, String> {
        match stored {
            StoredWatermark::Scalar(own) => Ok(Watermark::epoch().with_own(own)),
            StoredWatermark::Fields(fields) => {
                let mut watermark = Watermark::epoch();
                for (name, modified) in fields {
                    if name == OWN_FIELD {
                        watermark.own = Some(modified);
                    } else {
                        let kind = name.parse::<EntityKind>()?;
                        watermark.related.insert(kind, modified);
                    }
                }
                Ok(watermark)
            }
        }
    }
}

/// On-disk form of a single watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredWatermark {
    Scalar(DateTime<Utc>),
    Fields(BTreeMap<String, DateTime<Utc>>),
}

/// Committed watermarks for all kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatermarkMap(BTreeMap<EntityKind, Watermark>);

impl WatermarkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watermark for `kind`, or the epoch watermark when none was committed.
    pub fn get(&self, kind: EntityKind) -> Watermark {
        self.0.get(&kind).cloned().unwrap_or_default()
    }

    pub fn insert(&mut self, kind: EntityKind, watermark: Watermark) {
        self.0.insert(kind, watermark);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &Watermark)> {
        self.0.iter().map(|(kind, watermark)| (*kind, watermark))
    }
}
