//! PostgreSQL implementation of the relational source.
//!
//! Expected schema: `work`, `person`, `category`, plus the association tables
//! `work_person(work_id, person_id, role)` and `work_category(work_id,
//! category_id)`. The three entity tables carry a `modified timestamptz`
//! column.

pub mod queries;
mod source;

pub use source::PostgresSource;
