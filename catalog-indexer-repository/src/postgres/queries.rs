//! SQL for change-set resolution and row aggregation.
//!
//! Every query is parameterized; id sets are bound as a single `text[]`
//! parameter and matched with `= ANY($n)`, so the same statement serves one
//! id or many.
//!
//! Ids are ordered and compared under the `"C"` collation, which is the byte
//! order `String` sorts by on the Rust side.
//!
//! Change-set queries take the watermark components first, then the keyset
//! cursor (`after_modified`, `after_id`, both NULL for the first page), then
//! the page size.

use catalog_indexer_shared::EntityKind;

/// Works changed themselves or through a credited person or attached category.
///
/// `$1` work, `$2` person, `$3` category watermark; `$4`/`$5` cursor; `$6` limit.
pub const CHANGED_WORK_IDS: &str = r#"
SELECT w.id::text AS id, w.modified AS modified
FROM work w
LEFT JOIN work_person wp ON wp.work_id = w.id
LEFT JOIN person p ON p.id = wp.person_id
LEFT JOIN work_category wc ON wc.work_id = w.id
LEFT JOIN category c ON c.id = wc.category_id
WHERE (w.modified > $1 OR p.modified > $2 OR c.modified > $3)
  AND ($4::timestamptz IS NULL OR (w.modified, w.id::text COLLATE "C") > ($4::timestamptz, $5::text))
GROUP BY w.id, w.modified
ORDER BY w.modified, w.id::text COLLATE "C"
LIMIT $6
"#;

/// Persons changed themselves or through a work they are credited on.
///
/// `$1` person, `$2` work watermark; `$3`/`$4` cursor; `$5` limit.
pub const CHANGED_PERSON_IDS: &str = r#"
SELECT p.id::text AS id, p.modified AS modified
FROM person p
LEFT JOIN work_person wp ON wp.person_id = p.id
LEFT JOIN work w ON w.id = wp.work_id
WHERE (p.modified > $1 OR w.modified > $2)
  AND ($3::timestamptz IS NULL OR (p.modified, p.id::text COLLATE "C") > ($3::timestamptz, $4::text))
GROUP BY p.id, p.modified
ORDER BY p.modified, p.id::text COLLATE "C"
LIMIT $5
"#;

/// Categories changed themselves. Nothing propagates into categories.
///
/// `$1` category watermark; `$2`/`$3` cursor; `$4` limit.
pub const CHANGED_CATEGORY_IDS: &str = r#"
SELECT c.id::text AS id, c.modified AS modified
FROM category c
WHERE c.modified > $1
  AND ($2::timestamptz IS NULL OR (c.modified, c.id::text COLLATE "C") > ($2::timestamptz, $3::text))
ORDER BY c.modified, c.id::text COLLATE "C"
LIMIT $4
"#;

/// Works with their categories, role-partitioned credits and the `modified`
/// values of every related row. `$1` is the id set.
pub const FETCH_WORKS: &str = r#"
SELECT w.id::text AS id,
       w.title,
       w.description,
       w.rating::float8 AS rating,
       w.modified,
       JSONB_OBJECT_AGG(c.name, c.id::text)
           FILTER (WHERE c.id IS NOT NULL AND c.name IS NOT NULL) AS categories,
       JSONB_OBJECT_AGG(p.full_name, p.id::text)
           FILTER (WHERE wp.role = 'actor' AND p.full_name IS NOT NULL) AS actors,
       JSONB_OBJECT_AGG(p.full_name, p.id::text)
           FILTER (WHERE wp.role = 'director' AND p.full_name IS NOT NULL) AS directors,
       JSONB_OBJECT_AGG(p.full_name, p.id::text)
           FILTER (WHERE wp.role = 'writer' AND p.full_name IS NOT NULL) AS writers,
       COALESCE(ARRAY_AGG(DISTINCT p.modified) FILTER (WHERE p.id IS NOT NULL),
                '{}'::timestamptz[]) AS person_modified,
       COALESCE(ARRAY_AGG(DISTINCT c.modified) FILTER (WHERE c.id IS NOT NULL),
                '{}'::timestamptz[]) AS category_modified
FROM work w
LEFT JOIN work_person wp ON wp.work_id = w.id
LEFT JOIN person p ON p.id = wp.person_id
LEFT JOIN work_category wc ON wc.work_id = w.id
LEFT JOIN category c ON c.id = wc.category_id
WHERE w.id::text = ANY($1)
GROUP BY w.id
"#;

/// Persons with per-role work id arrays (as array literals) and the
/// `modified` values of every credited work. `$1` is the id set.
pub const FETCH_PERSONS: &str = r#"
SELECT p.id::text AS id,
       p.full_name,
       p.modified,
       (ARRAY_AGG(DISTINCT wp.work_id::text) FILTER (WHERE wp.role = 'actor'))::text AS actor_work_ids,
       (ARRAY_AGG(DISTINCT wp.work_id::text) FILTER (WHERE wp.role = 'director'))::text AS director_work_ids,
       (ARRAY_AGG(DISTINCT wp.work_id::text) FILTER (WHERE wp.role = 'writer'))::text AS writer_work_ids,
       COALESCE(ARRAY_AGG(DISTINCT w.modified) FILTER (WHERE w.id IS NOT NULL),
                '{}'::timestamptz[]) AS work_modified
FROM person p
LEFT JOIN work_person wp ON wp.person_id = p.id
LEFT JOIN work w ON w.id = wp.work_id
WHERE p.id::text = ANY($1)
GROUP BY p.id
"#;

/// Categories by id. `$1` is the id set.
pub const FETCH_CATEGORIES: &str = r#"
SELECT c.id::text AS id, c.name, c.description, c.modified
FROM category c
WHERE c.id::text = ANY($1)
"#;

/// Latest `modified` per table, `NULL` for an empty table.
pub const MAX_WORK_MODIFIED: &str = "SELECT MAX(modified) AS modified FROM work";
pub const MAX_PERSON_MODIFIED: &str = "SELECT MAX(modified) AS modified FROM person";
pub const MAX_CATEGORY_MODIFIED: &str = "SELECT MAX(modified) AS modified FROM category";

/// Change-set statement for `kind`.
pub fn changed_ids(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Work => CHANGED_WORK_IDS,
        EntityKind::Person => CHANGED_PERSON_IDS,
        EntityKind::Category => CHANGED_CATEGORY_IDS,
    }
}

/// Aggregation statement for `kind`.
pub fn fetch_rows(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Work => FETCH_WORKS,
        EntityKind::Person => FETCH_PERSONS,
        EntityKind::Category => FETCH_CATEGORIES,
    }
}

/// High-water mark statement for `kind`.
pub fn max_modified(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Work => MAX_WORK_MODIFIED,
        EntityKind::Person => MAX_PERSON_MODIFIED,
        EntityKind::Category => MAX_CATEGORY_MODIFIED,
    }
}
