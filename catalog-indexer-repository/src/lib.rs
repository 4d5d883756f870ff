//! # Catalog Indexer Repository
//!
//! This crate provides traits and implementations for the systems the
//! indexer talks to: the relational source, the search index and the
//! watermark store. It includes definitions for errors, interfaces, and
//! concrete implementations for PostgreSQL, OpenSearch and a JSON state
//! file. In-memory implementations for tests are available with the
//! `test-util` feature.

pub mod config;
pub mod errors;
pub mod interfaces;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod opensearch;
pub mod postgres;
pub mod state;
pub mod types;

pub use config::SearchIndexConfig;
pub use errors::{SearchIndexError, SourceError, StateError};
pub use interfaces::{SearchIndexProvider, SourceRepository, WatermarkStore};
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemorySource;
pub use opensearch::{IndexConfig, OpenSearchClient};
pub use postgres::PostgresSource;
pub use state::JsonFileWatermarkStore;
#[cfg(any(test, feature = "test-util"))]
pub use state::InMemoryWatermarkStore;
pub use types::{BulkItem, BulkItemResult, BulkOperation};
