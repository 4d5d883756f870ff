//! Entity kinds and association roles.
//!
//! `EntityKind` is the single place that describes what each kind of catalog
//! entity needs from the pipeline: which related kinds propagate into it, which
//! index it lives in, and which mapping asset creates that index.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kinds of entities kept in the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A film work (movie, series, ...).
    Work,
    /// A person credited on works.
    Person,
    /// A category (genre) attached to works.
    Category,
}

impl EntityKind {
    /// All kinds, in the order the orchestrator processes them.
    pub const ALL: [EntityKind; 3] = [EntityKind::Work, EntityKind::Person, EntityKind::Category];

    /// Stable lowercase name, used as the persisted state key.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Work => "work",
            EntityKind::Person => "person",
            EntityKind::Category => "category",
        }
    }

    /// Kinds whose changes must trigger re-delivery of documents of this kind.
    ///
    /// A work document embeds person and category names, a person document
    /// embeds the works it is credited on. Categories are flat.
    pub fn related_kinds(&self) -> &'static [EntityKind] {
        match self {
            EntityKind::Work => &[EntityKind::Person, EntityKind::Category],
            EntityKind::Person => &[EntityKind::Work],
            EntityKind::Category => &[],
        }
    }

    /// Name of the search index holding documents of this kind.
    pub fn index_name(&self) -> &'static str {
        match self {
            EntityKind::Work => "movies",
            EntityKind::Person => "persons",
            EntityKind::Category => "genres",
        }
    }

    /// File name of the static mapping asset for this kind's index.
    pub fn mapping_asset(&self) -> &'static str {
        match self {
            EntityKind::Work => "movies.json",
            EntityKind::Person => "persons.json",
            EntityKind::Category => "genres.json",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(EntityKind::Work),
            "person" => Ok(EntityKind::Person),
            "category" => Ok(EntityKind::Category),
            other => Err(format!("unknown entity kind: {}", other)),
        }
    }
}

/// Role tag on the work ↔ person association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Actor,
    Director,
    Writer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Actor, Role::Director, Role::Writer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Actor => "actor",
            Role::Director => "director",
            Role::Writer => "writer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
