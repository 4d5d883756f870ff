//! # Catalog Indexer Shared
//!
//! Types shared by every catalog indexer crate: entity kinds, aggregated
//! source rows, search documents and watermarks.

pub mod document;
pub mod kind;
pub mod row;
pub mod watermark;

pub use document::{CategoryDocument, NamedRef, PersonDocument, SearchDocument, WorkDocument};
pub use kind::{EntityKind, Role};
pub use row::{AggregatedRow, CategoryRow, PersonRow, WorkRow};
pub use watermark::{ChangedId, RelatedModified, StoredWatermark, Watermark, WatermarkMap};
