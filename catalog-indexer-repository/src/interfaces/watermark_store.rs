//! Watermark store trait definition.

use async_trait::async_trait;

use crate::errors::StateError;
use catalog_indexer_shared::{EntityKind, Watermark, WatermarkMap};

/// Durable storage for committed watermarks.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Load every committed watermark.
    ///
    /// Missing or unreadable storage yields an empty map, which means
    /// "process everything".
    async fn load(&self) -> WatermarkMap;

    /// Replace the stored watermark of `kind`, keeping the other kinds' entries.
    ///
    /// The whole mapping is replaced atomically.
    async fn save(&self, kind: EntityKind, watermark: &Watermark) -> Result<(), StateError>;
}
