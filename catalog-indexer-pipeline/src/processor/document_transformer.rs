//! Document transformer implementation.
//!
//! Turns aggregated rows into search documents and reports the latest
//! `modified` value of every related kind the row embeds.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use super::array_literal::parse_array_literal;
use catalog_indexer_shared::{
    AggregatedRow, CategoryDocument, CategoryRow, EntityKind, NamedRef, PersonDocument, PersonRow,
    RelatedModified, Role, SearchDocument, WorkDocument, WorkRow,
};

/// Reasons a row cannot be turned into a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("expected a {expected} row, got a {actual} row")]
    KindMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },

    #[error("{field} of {id} is blank")]
    MissingField { id: String, field: &'static str },

    #[error("{field} of {id} is not a name to id mapping")]
    InvalidMapping { id: String, field: &'static str },

    #[error("{field} of {id} maps {name:?} to a non-string id")]
    InvalidMappingId {
        id: String,
        field: &'static str,
        name: String,
    },

    #[error("{field} of {id} is not a valid array literal: {reason}")]
    InvalidArrayLiteral {
        id: String,
        field: &'static str,
        reason: String,
    },
}

/// Names and `{id, name}` pairs unpacked from one related mapping.
#[derive(Debug, Default)]
struct Unpacked {
    names: Vec<String>,
    refs: Vec<NamedRef>,
}

/// Transforms aggregated rows into search documents.
///
/// Stateless; the related-modified fold is returned with each document and
/// reduced by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentTransformer;

impl DocumentTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Transform one row of `kind`.
    #[instrument(skip(self, row), fields(kind = %kind, id = %row.id()))]
    pub fn transform(
        &self,
        kind: EntityKind,
        row: &AggregatedRow,
    ) -> Result<(SearchDocument, RelatedModified), TransformError> {
        if row.kind() != kind {
            return Err(TransformError::KindMismatch {
                expected: kind,
                actual: row.kind(),
            });
        }

        let transformed = match row {
            AggregatedRow::Work(work) => Self::work(work)?,
            AggregatedRow::Person(person) => Self::person(person)?,
            AggregatedRow::Category(category) => Self::category(category)?,
        };

        debug!("Transformed row");
        Ok(transformed)
    }

    fn work(row: &WorkRow) -> Result<(SearchDocument, RelatedModified), TransformError> {
        let title = required(&row.id, "title", row.title.as_deref())?;
        let genres = unpack_mapping(&row.id, "categories", row.categories.as_ref())?;
        let actors = unpack_mapping(&row.id, "actors", row.actors.as_ref())?;
        let directors = unpack_mapping(&row.id, "directors", row.directors.as_ref())?;
        let writers = unpack_mapping(&row.id, "writers", row.writers.as_ref())?;

        let document = WorkDocument {
            id: row.id.clone(),
            imdb_rating: row.rating,
            genre: genres.names,
            genres: genres.refs,
            title,
            description: row.description.clone(),
            director: directors.names,
            directors: directors.refs,
            actors_names: actors.names,
            actors: actors.refs,
            writers_names: writers.names,
            writers: writers.refs,
        };

        let mut related = RelatedModified::new();
        related.observe_all(EntityKind::Person, &row.person_modified);
        related.observe_all(EntityKind::Category, &row.category_modified);

        Ok((SearchDocument::Work(document), related))
    }

    fn person(row: &PersonRow) -> Result<(SearchDocument, RelatedModified), TransformError> {
        let full_name = required(&row.id, "full_name", row.full_name.as_deref())?;
        let actor_film_ids = parse_ids(&row.id, "actor_work_ids", row.actor_work_ids.as_deref())?;
        let director_film_ids =
            parse_ids(&row.id, "director_work_ids", row.director_work_ids.as_deref())?;
        let writer_film_ids = parse_ids(&row.id, "writer_work_ids", row.writer_work_ids.as_deref())?;

        let roles = Role::ALL
            .into_iter()
            .filter(|role| {
                let ids = match role {
                    Role::Actor => &actor_film_ids,
                    Role::Director => &director_film_ids,
                    Role::Writer => &writer_film_ids,
                };
                !ids.is_empty()
            })
            .collect();

        let document = PersonDocument {
            id: row.id.clone(),
            full_name,
            roles,
            actor_film_ids,
            director_film_ids,
            writer_film_ids,
        };

        let mut related = RelatedModified::new();
        related.observe_all(EntityKind::Work, &row.work_modified);

        Ok((SearchDocument::Person(document), related))
    }

    fn category(row: &CategoryRow) -> Result<(SearchDocument, RelatedModified), TransformError> {
        let document = CategoryDocument {
            id: row.id.clone(),
            name: required(&row.id, "name", row.name.as_deref())?,
            description: row.description.clone(),
        };
        Ok((SearchDocument::Category(document), RelatedModified::new()))
    }
}

fn required(id: &str, field: &'static str, value: Option<&str>) -> Result<String, TransformError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(TransformError::MissingField {
            id: id.to_string(),
            field,
        }),
    }
}

/// Unpack a `name → id` mapping, sorted by name then id.
fn unpack_mapping(
    id: &str,
    field: &'static str,
    value: Option<&Value>,
) -> Result<Unpacked, TransformError> {
    let entries = match value {
        None | Some(Value::Null) => return Ok(Unpacked::default()),
        Some(Value::Object(entries)) => entries,
        Some(_) => {
            return Err(TransformError::InvalidMapping {
                id: id.to_string(),
                field,
            })
        }
    };

    let mut refs = entries
        .iter()
        .map(|(name, related_id)| match related_id {
            Value::String(related_id) => Ok(NamedRef::new(related_id.clone(), name.clone())),
            _ => Err(TransformError::InvalidMappingId {
                id: id.to_string(),
                field,
                name: name.clone(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    refs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    Ok(Unpacked {
        names: refs.iter().map(|r| r.name.clone()).collect(),
        refs,
    })
}

fn parse_ids(id: &str, field: &'static str, literal: Option<&str>) -> Result<Vec<String>, TransformError> {
    let Some(literal) = literal else {
        return Ok(Vec::new());
    };
    let mut ids = parse_array_literal(literal).map_err(|reason| TransformError::InvalidArrayLiteral {
        id: id.to_string(),
        field,
        reason,
    })?;
    ids.sort();
    ids.dedup();
    Ok(ids)
}
