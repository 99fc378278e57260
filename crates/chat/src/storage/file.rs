//! JSON-file watermark storage
//!
//! Stores the read-state map as a flat JSON object in the Herald config
//! directory (~/.config/herald/read-state.json).

use anyhow::{Context, Result};
use log::warn;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{WatermarkMap, WatermarkStore};

/// Read-state filename in the Herald config directory
const READ_STATE_FILE: &str = "read-state.json";

/// File-backed implementation of WatermarkStore
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location in the config directory
    pub fn open_default() -> Result<Self> {
        let path = config::config_path(READ_STATE_FILE)
            .context("Could not determine config directory")?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn load(&self) -> Result<Option<WatermarkMap>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw: BTreeMap<String, serde_json::Value> = config::load_json_file(&self.path)?;

        // A single bad entry should not cost the user every other watermark
        let mut map = WatermarkMap::new();
        for (key, value) in raw {
            match value.as_u64() {
                Some(count) => {
                    map.insert(key, count);
                }
                None => warn!("Ignoring invalid read-state entry for {}: {}", key, value),
            }
        }
        Ok(Some(map))
    }

    fn save(&self, watermarks: &WatermarkMap) -> Result<()> {
        config::save_json_file(&self.path, watermarks)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWatermarkStore::new(dir.path().join(READ_STATE_FILE));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileWatermarkStore::new(dir.path().join(READ_STATE_FILE));

        let mut map = WatermarkMap::new();
        map.insert("+15550001".to_string(), 12);
        map.insert("grp==".to_string(), 3);
        store.save(&map).unwrap();

        assert_eq!(store.load().unwrap(), Some(map));
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(READ_STATE_FILE);
        std::fs::write(&path, "{not json").unwrap();

        let store = FileWatermarkStore::new(path);
        assert!(store.load().is_err());
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(READ_STATE_FILE);
        std::fs::write(&path, r#"{"+1": 5, "+2": -3, "+3": "x", "+4": 7}"#).unwrap();

        let store = FileWatermarkStore::new(path);
        let map = store.load().unwrap().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("+1"), Some(&5));
        assert_eq!(map.get("+4"), Some(&7));
    }
}
