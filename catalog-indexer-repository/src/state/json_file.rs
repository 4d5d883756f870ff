//! JSON file watermark store.
//!
//! The file holds one entry per kind, keyed by kind name. Kinds without
//! relations store a bare timestamp; the others store an object with an
//! `own` field plus one field per related kind:
//!
//! ```json
//! {
//!   "category": "2024-01-02T00:00:00Z",
//!   "person": {"own": "2024-01-03T00:00:00Z", "work": "2024-01-01T00:00:00Z"},
//!   "work": {"own": "2024-01-03T00:00:00Z", "person": "2024-01-02T00:00:00Z"}
//! }
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::errors::StateError;
use crate::interfaces::WatermarkStore;
use catalog_indexer_shared::{EntityKind, StoredWatermark, Watermark, WatermarkMap};

/// Watermark store backed by a single JSON file.
///
/// Saves write a sibling temporary file and rename it over the target, so a
/// crash mid-write leaves the previous mapping intact.
pub struct JsonFileWatermarkStore {
    path: PathBuf,
    // serializes read-modify-write cycles within the process
    write_lock: Mutex<()>,
}

impl JsonFileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the stored entries, skipping any that cannot be interpreted.
    async fn read_entries(&self) -> BTreeMap<EntityKind, StoredWatermark> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, starting from epoch");
                return BTreeMap::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable state file, starting from epoch");
                return BTreeMap::new();
            }
        };

        let entries: BTreeMap<String, StoredWatermark> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt state file, starting from epoch");
                return BTreeMap::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|(name, stored)| match name.parse::<EntityKind>() {
                Ok(kind) => Some((kind, stored)),
                Err(e) => {
                    warn!(entry = %name, error = %e, "Ignoring unknown state entry");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl WatermarkStore for JsonFileWatermarkStore {
    async fn load(&self) -> WatermarkMap {
        let mut watermarks = WatermarkMap::new();
        for (kind, stored) in self.read_entries().await {
            match Watermark::from_stored(stored) {
                Ok(watermark) => watermarks.insert(kind, watermark),
                Err(e) => warn!(kind = %kind, error = %e, "Ignoring invalid watermark"),
            }
        }
        watermarks
    }

    #[instrument(skip(self, watermark), fields(kind = %kind))]
    async fn save(&self, kind: EntityKind, watermark: &Watermark) -> Result<(), StateError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_entries().await;
        match watermark.to_stored(kind) {
            Some(stored) => {
                entries.insert(kind, stored);
            }
            None => {
                entries.remove(&kind);
            }
        }

        let keyed: BTreeMap<&str, StoredWatermark> = entries
            .into_iter()
            .map(|(kind, stored)| (kind.as_str(), stored))
            .collect();
        let body = serde_json::to_vec_pretty(&keyed)
            .map_err(|e| StateError::serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &body).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), "Saved watermark");
        Ok(())
    }
}
