//! In-memory watermark store.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::StateError;
use crate::interfaces::WatermarkStore;
use catalog_indexer_shared::{EntityKind, Watermark, WatermarkMap};

/// Watermark store that keeps committed values in memory only.
#[derive(Debug, Default)]
pub struct InMemoryWatermarkStore {
    watermarks: Mutex<WatermarkMap>,
    saves: AtomicUsize,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `watermarks`.
    pub fn with_watermarks(watermarks: WatermarkMap) -> Self {
        Self {
            watermarks: Mutex::new(watermarks),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn load(&self) -> WatermarkMap {
        self.watermarks.lock().await.clone()
    }

    async fn save(&self, kind: EntityKind, watermark: &Watermark) -> Result<(), StateError> {
        self.watermarks.lock().await.insert(kind, watermark.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
