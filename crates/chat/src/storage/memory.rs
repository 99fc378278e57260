//! In-memory watermark storage
//!
//! Used in tests and when no config directory is available. Can be told
//! to fail writes so persistence-warning paths can be exercised.

use anyhow::{Result, bail};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{WatermarkMap, WatermarkStore};

/// In-memory implementation of WatermarkStore
pub struct InMemoryWatermarkStore {
    saved: RwLock<Option<WatermarkMap>>,
    /// When set, `load` fails as if the blob were unparsable
    corrupt: AtomicBool,
    fail_saves: AtomicBool,
    save_count: AtomicUsize,
}

impl InMemoryWatermarkStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            saved: RwLock::new(None),
            corrupt: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            save_count: AtomicUsize::new(0),
        }
    }

    /// Create a store that already holds the given map
    pub fn with_watermarks(watermarks: WatermarkMap) -> Self {
        let store = Self::new();
        *store.saved.write().unwrap() = Some(watermarks);
        store
    }

    /// Make subsequent loads fail as if the blob were unparsable
    pub fn set_corrupt(&self, corrupt: bool) {
        self.corrupt.store(corrupt, Ordering::SeqCst);
    }

    /// Make subsequent saves fail
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of what was last saved successfully
    pub fn saved(&self) -> Option<WatermarkMap> {
        self.saved.read().unwrap().clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryWatermarkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkStore for InMemoryWatermarkStore {
    fn load(&self) -> Result<Option<WatermarkMap>> {
        if self.corrupt.load(Ordering::SeqCst) {
            bail!("stored read state is not valid JSON");
        }
        Ok(self.saved.read().unwrap().clone())
    }

    fn save(&self, watermarks: &WatermarkMap) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("simulated write failure");
        }
        *self.saved.write().unwrap() = Some(watermarks.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_count() {
        let store = InMemoryWatermarkStore::new();
        assert!(store.load().unwrap().is_none());

        let mut map = WatermarkMap::new();
        map.insert("+1".to_string(), 4);
        store.save(&map).unwrap();

        assert_eq!(store.load().unwrap(), Some(map));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_failure_switches() {
        let store = InMemoryWatermarkStore::new();
        store.set_fail_saves(true);
        assert!(store.save(&WatermarkMap::new()).is_err());
        assert_eq!(store.save_count(), 0);

        store.set_corrupt(true);
        assert!(store.load().is_err());
    }
}
