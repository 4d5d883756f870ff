//! Search document types.
//!
//! Documents are denormalized projections of one entity and everything the
//! index needs from its related entities. They are upserted by id, so every
//! field is always present: empty associations serialize as `[]`, never as
//! `null` or a missing key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kind::{EntityKind, Role};

/// An `{id, name}` pair used for faceting and linking related entities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

impl NamedRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Document stored in the works index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkDocument {
    pub id: String,
    pub imdb_rating: Option<f64>,
    pub genre: Vec<String>,
    pub genres: Vec<NamedRef>,
    pub title: String,
    pub description: Option<String>,
    pub director: Vec<String>,
    pub directors: Vec<NamedRef>,
    pub actors_names: Vec<String>,
    pub actors: Vec<NamedRef>,
    pub writers_names: Vec<String>,
    pub writers: Vec<NamedRef>,
}

/// Document stored in the persons index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDocument {
    pub id: String,
    pub full_name: String,
    pub roles: Vec<Role>,
    pub actor_film_ids: Vec<String>,
    pub director_film_ids: Vec<String>,
    pub writer_film_ids: Vec<String>,
}

/// Document stored in the categories index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDocument {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// A document of any kind, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchDocument {
    Work(WorkDocument),
    Person(PersonDocument),
    Category(CategoryDocument),
}

impl SearchDocument {
    pub fn kind(&self) -> EntityKind {
        match self {
            SearchDocument::Work(_) => EntityKind::Work,
            SearchDocument::Person(_) => EntityKind::Person,
            SearchDocument::Category(_) => EntityKind::Category,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SearchDocument::Work(doc) => &doc.id,
            SearchDocument::Person(doc) => &doc.id,
            SearchDocument::Category(doc) => &doc.id,
        }
    }

    /// The JSON body sent to the index.
    pub fn to_body(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
