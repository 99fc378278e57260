//! Storage trait definitions

use anyhow::Result;
use std::collections::BTreeMap;

/// Raw watermark map as persisted: contact id -> message count at last read
pub type WatermarkMap = BTreeMap<String, u64>;

/// Durable backing for the read-state store
///
/// Implementations only move an opaque key -> integer blob in and out.
/// Monotonicity and defaults are enforced by [`super::ReadStateStore`].
pub trait WatermarkStore: Send + Sync {
    /// Load the persisted map.
    ///
    /// Returns `Ok(None)` when nothing has been saved yet and an error when
    /// the stored blob cannot be read or parsed.
    fn load(&self) -> Result<Option<WatermarkMap>>;

    /// Replace the persisted map, returning only once the write is durable
    fn save(&self, watermarks: &WatermarkMap) -> Result<()>;

    /// Human-readable location for log and warning messages
    fn location(&self) -> String;
}

impl<T: WatermarkStore + ?Sized> WatermarkStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<WatermarkMap>> {
        (**self).load()
    }

    fn save(&self, watermarks: &WatermarkMap) -> Result<()> {
        (**self).save(watermarks)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}
