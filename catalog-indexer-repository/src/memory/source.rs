//! In-memory relational source.
//!
//! Holds the same five tables as the PostgreSQL schema and evaluates the same
//! change-set predicates and aggregations over them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::errors::SourceError;
use crate::interfaces::SourceRepository;
use catalog_indexer_shared::{
    AggregatedRow, CategoryRow, ChangedId, EntityKind, PersonRow, Role, Watermark, WorkRow,
};

/// A row of the `work` table.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkRecord {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub modified: DateTime<Utc>,
}

impl WorkRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            description: None,
            rating: None,
            modified,
        }
    }
}

/// A row of the `person` table.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRecord {
    pub id: String,
    pub full_name: Option<String>,
    pub modified: DateTime<Utc>,
}

impl PersonRecord {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            full_name: Some(full_name.into()),
            modified,
        }
    }
}

/// A row of the `category` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRecord {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub modified: DateTime<Utc>,
}

impl CategoryRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            description: None,
            modified,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    works: BTreeMap<String, WorkRecord>,
    persons: BTreeMap<String, PersonRecord>,
    categories: BTreeMap<String, CategoryRecord>,
    /// `(work_id, person_id, role)`
    credits: BTreeSet<(String, String, Role)>,
    /// `(work_id, category_id)`
    work_categories: BTreeSet<(String, String)>,
}

impl Tables {
    fn credits_of_work<'a>(
        &'a self,
        work_id: &'a str,
    ) -> impl Iterator<Item = (&'a PersonRecord, Role)> + 'a {
        self.credits
            .iter()
            .filter(move |(w, _, _)| w == work_id)
            .filter_map(move |(_, p, role)| self.persons.get(p).map(|person| (person, *role)))
    }

    fn categories_of_work<'a>(
        &'a self,
        work_id: &'a str,
    ) -> impl Iterator<Item = &'a CategoryRecord> + 'a {
        self.work_categories
            .iter()
            .filter(move |(w, _)| w == work_id)
            .filter_map(move |(_, c)| self.categories.get(c))
    }

    fn credits_of_person<'a>(
        &'a self,
        person_id: &'a str,
    ) -> impl Iterator<Item = (&'a str, Role)> + 'a {
        self.credits
            .iter()
            .filter(move |(_, p, _)| p == person_id)
            .map(|(w, _, role)| (w.as_str(), *role))
    }

    fn work_changed(&self, work: &WorkRecord, watermark: &Watermark) -> bool {
        let person_mark = watermark.related_or_epoch(EntityKind::Person);
        let category_mark = watermark.related_or_epoch(EntityKind::Category);

        work.modified > watermark.own_or_epoch()
            || self
                .credits_of_work(&work.id)
                .any(|(person, _)| person.modified > person_mark)
            || self
                .categories_of_work(&work.id)
                .any(|category| category.modified > category_mark)
    }

    fn person_changed(&self, person: &PersonRecord, watermark: &Watermark) -> bool {
        let work_mark = watermark.related_or_epoch(EntityKind::Work);

        person.modified > watermark.own_or_epoch()
            || self
                .credits_of_person(&person.id)
                .filter_map(|(work_id, _)| self.works.get(work_id))
                .any(|work| work.modified > work_mark)
    }

    fn work_row(&self, work: &WorkRecord) -> WorkRow {
        let mut actors = Map::new();
        let mut directors = Map::new();
        let mut writers = Map::new();
        let mut person_modified = BTreeSet::new();

        for (person, role) in self.credits_of_work(&work.id) {
            person_modified.insert(person.modified);
            let Some(name) = &person.full_name else {
                continue;
            };
            let target = match role {
                Role::Actor => &mut actors,
                Role::Director => &mut directors,
                Role::Writer => &mut writers,
            };
            target.insert(name.clone(), Value::String(person.id.clone()));
        }

        let mut categories = Map::new();
        let mut category_modified = BTreeSet::new();
        for category in self.categories_of_work(&work.id) {
            category_modified.insert(category.modified);
            if let Some(name) = &category.name {
                categories.insert(name.clone(), Value::String(category.id.clone()));
            }
        }

        WorkRow {
            id: work.id.clone(),
            title: work.title.clone(),
            description: work.description.clone(),
            rating: work.rating,
            modified: work.modified,
            categories: non_empty_object(categories),
            actors: non_empty_object(actors),
            directors: non_empty_object(directors),
            writers: non_empty_object(writers),
            person_modified: person_modified.into_iter().collect(),
            category_modified: category_modified.into_iter().collect(),
        }
    }

    fn person_row(&self, person: &PersonRecord) -> PersonRow {
        let mut by_role: BTreeMap<Role, BTreeSet<&str>> = BTreeMap::new();
        let mut work_modified = BTreeSet::new();

        for (work_id, role) in self.credits_of_person(&person.id) {
            by_role.entry(role).or_default().insert(work_id);
            if let Some(work) = self.works.get(work_id) {
                work_modified.insert(work.modified);
            }
        }

        let literal = |role: Role| {
            by_role
                .get(&role)
                .map(|ids| format!("{{{}}}", ids.iter().copied().collect::<Vec<_>>().join(",")))
        };

        PersonRow {
            id: person.id.clone(),
            full_name: person.full_name.clone(),
            modified: person.modified,
            actor_work_ids: literal(Role::Actor),
            director_work_ids: literal(Role::Director),
            writer_work_ids: literal(Role::Writer),
            work_modified: work_modified.into_iter().collect(),
        }
    }
}

/// `NULL` when there is nothing to aggregate, as `JSONB_OBJECT_AGG ... FILTER` returns.
fn non_empty_object(map: Map<String, Value>) -> Option<Value> {
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

/// Relational source over in-memory tables.
#[derive(Debug, Default)]
pub struct InMemorySource {
    tables: RwLock<Tables>,
    changed_ids_calls: AtomicUsize,
    fetch_rows_calls: AtomicUsize,
    pending_failures: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a work.
    pub async fn upsert_work(&self, work: WorkRecord) {
        self.tables.write().await.works.insert(work.id.clone(), work);
    }

    /// Insert or replace a person.
    pub async fn upsert_person(&self, person: PersonRecord) {
        self.tables.write().await.persons.insert(person.id.clone(), person);
    }

    /// Insert or replace a category.
    pub async fn upsert_category(&self, category: CategoryRecord) {
        self.tables
            .write()
            .await
            .categories
            .insert(category.id.clone(), category);
    }

    /// Credit a person on a work.
    pub async fn link_person(&self, work_id: &str, person_id: &str, role: Role) {
        self.tables
            .write()
            .await
            .credits
            .insert((work_id.to_string(), person_id.to_string(), role));
    }

    /// Attach a category to a work.
    pub async fn link_category(&self, work_id: &str, category_id: &str) {
        self.tables
            .write()
            .await
            .work_categories
            .insert((work_id.to_string(), category_id.to_string()));
    }

    /// Make the next `count` queries fail with a connection error.
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Number of `changed_ids` calls served so far.
    pub fn changed_ids_calls(&self) -> usize {
        self.changed_ids_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_rows` calls served so far.
    pub fn fetch_rows_calls(&self) -> usize {
        self.fetch_rows_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), SourceError> {
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            Err(SourceError::connection("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SourceRepository for InMemorySource {
    async fn changed_ids(
        &self,
        kind: EntityKind,
        watermark: &Watermark,
        after: Option<&ChangedId>,
        limit: usize,
    ) -> Result<Vec<ChangedId>, SourceError> {
        self.changed_ids_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let tables = self.tables.read().await;
        let mut changed: Vec<ChangedId> = match kind {
            EntityKind::Work => tables
                .works
                .values()
                .filter(|work| tables.work_changed(work, watermark))
                .map(|work| ChangedId::new(&work.id, work.modified))
                .collect(),
            EntityKind::Person => tables
                .persons
                .values()
                .filter(|person| tables.person_changed(person, watermark))
                .map(|person| ChangedId::new(&person.id, person.modified))
                .collect(),
            EntityKind::Category => tables
                .categories
                .values()
                .filter(|category| category.modified > watermark.own_or_epoch())
                .map(|category| ChangedId::new(&category.id, category.modified))
                .collect(),
        };

        changed.sort();
        Ok(changed
            .into_iter()
            .filter(|c| after.map_or(true, |a| c > a))
            .take(limit)
            .collect())
    }

    async fn fetch_rows(
        &self,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<Vec<AggregatedRow>, SourceError> {
        self.fetch_rows_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let tables = self.tables.read().await;
        let wanted: BTreeSet<&str> = ids.iter().map(String::as_str).collect();

        let rows = match kind {
            EntityKind::Work => tables
                .works
                .values()
                .filter(|work| wanted.contains(work.id.as_str()))
                .map(|work| AggregatedRow::Work(tables.work_row(work)))
                .collect(),
            EntityKind::Person => tables
                .persons
                .values()
                .filter(|person| wanted.contains(person.id.as_str()))
                .map(|person| AggregatedRow::Person(tables.person_row(person)))
                .collect(),
            EntityKind::Category => tables
                .categories
                .values()
                .filter(|category| wanted.contains(category.id.as_str()))
                .map(|category| {
                    AggregatedRow::Category(CategoryRow {
                        id: category.id.clone(),
                        name: category.name.clone(),
                        description: category.description.clone(),
                        modified: category.modified,
                    })
                })
                .collect(),
        };

        Ok(rows)
    }

    async fn max_modified(&self, kind: EntityKind) -> Result<Option<DateTime<Utc>>, SourceError> {
        let tables = self.tables.read().await;
        let latest = match kind {
            EntityKind::Work => tables.works.values().map(|w| w.modified).max(),
            EntityKind::Person => tables.persons.values().map(|p| p.modified).max(),
            EntityKind::Category => tables.categories.values().map(|c| c.modified).max(),
        };
        Ok(latest)
    }
}
