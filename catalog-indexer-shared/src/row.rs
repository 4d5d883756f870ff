//! Aggregated rows produced by extraction.
//!
//! An aggregated row carries one entity's own columns plus denormalized
//! summaries of its related entities, exactly as the source returned them.
//! Association summaries are kept raw (`serde_json::Value`, array literals) so
//! the transformer can reject malformed rows instead of the decoder silently
//! dropping data.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::kind::EntityKind;

/// Aggregated work row.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkRow {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub modified: DateTime<Utc>,
    /// Category name → category id, `None` when the work has no categories.
    pub categories: Option<Value>,
    /// Actor name → person id.
    pub actors: Option<Value>,
    /// Director name → person id.
    pub directors: Option<Value>,
    /// Writer name → person id.
    pub writers: Option<Value>,
    /// `modified` of every associated person.
    pub person_modified: Vec<DateTime<Utc>>,
    /// `modified` of every associated category.
    pub category_modified: Vec<DateTime<Utc>>,
}

/// Aggregated person row.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRow {
    pub id: String,
    pub full_name: Option<String>,
    pub modified: DateTime<Utc>,
    /// Work ids credited as actor, as a source array literal (`{id1,id2}`).
    pub actor_work_ids: Option<String>,
    pub director_work_ids: Option<String>,
    pub writer_work_ids: Option<String>,
    /// `modified` of every associated work.
    pub work_modified: Vec<DateTime<Utc>>,
}

/// Category row. Categories have no aggregated relations.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub modified: DateTime<Utc>,
}

/// One extracted row of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatedRow {
    Work(WorkRow),
    Person(PersonRow),
    Category(CategoryRow),
}

impl AggregatedRow {
    pub fn kind(&self) -> EntityKind {
        match self {
            AggregatedRow::Work(_) => EntityKind::Work,
            AggregatedRow::Person(_) => EntityKind::Person,
            AggregatedRow::Category(_) => EntityKind::Category,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            AggregatedRow::Work(row) => &row.id,
            AggregatedRow::Person(row) => &row.id,
            AggregatedRow::Category(row) => &row.id,
        }
    }

    pub fn modified(&self) -> DateTime<Utc> {
        match self {
            AggregatedRow::Work(row) => row.modified,
            AggregatedRow::Person(row) => row.modified,
            AggregatedRow::Category(row) => row.modified,
        }
    }
}
