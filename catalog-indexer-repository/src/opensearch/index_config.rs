//! Index configuration and mappings.
//!
//! Each entity kind has its own index, created on startup from a static
//! settings-and-mappings asset. The assets are compiled in; a mappings
//! directory can override them without a rebuild.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::errors::SearchIndexError;
use catalog_indexer_shared::EntityKind;

const MOVIES_MAPPING: &str = include_str!("../../assets/mappings/movies.json");
const PERSONS_MAPPING: &str = include_str!("../../assets/mappings/persons.json");
const GENRES_MAPPING: &str = include_str!("../../assets/mappings/genres.json");

/// Settings and mappings for one kind's index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// The kind of documents stored in the index.
    pub kind: EntityKind,
    /// The index name.
    pub name: String,
    /// Body of the index creation request (`settings` + `mappings`).
    pub settings: Value,
}

impl IndexConfig {
    /// Configuration built from the compiled-in mapping asset.
    pub fn embedded(kind: EntityKind) -> Result<Self, SearchIndexError> {
        let raw = match kind {
            EntityKind::Work => MOVIES_MAPPING,
            EntityKind::Person => PERSONS_MAPPING,
            EntityKind::Category => GENRES_MAPPING,
        };
        Self::from_json(kind, raw)
    }

    /// Configuration for `kind`, read from `dir` when given.
    ///
    /// The file name is the kind's mapping asset name (e.g. `movies.json`).
    pub fn load(kind: EntityKind, dir: Option<&Path>) -> Result<Self, SearchIndexError> {
        let Some(dir) = dir else {
            return Self::embedded(kind);
        };

        let path = dir.join(kind.mapping_asset());
        debug!(kind = %kind, path = %path.display(), "Loading index mapping");
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| SearchIndexError::mapping(format!("{}: {}", path.display(), e)))?;
        Self::from_json(kind, &raw)
    }

    fn from_json(kind: EntityKind, raw: &str) -> Result<Self, SearchIndexError> {
        let settings: Value = serde_json::from_str(raw)
            .map_err(|e| SearchIndexError::mapping(format!("{}: {}", kind.mapping_asset(), e)))?;

        if !settings["mappings"]["properties"].is_object() {
            return Err(SearchIndexError::mapping(format!(
                "{}: missing mappings.properties",
                kind.mapping_asset()
            )));
        }

        Ok(Self {
            kind,
            name: kind.index_name().to_string(),
            settings,
        })
    }
}
