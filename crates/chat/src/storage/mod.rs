//! Read-state storage
//!
//! The only durable state the engine owns is the per-conversation read
//! watermark map. The trait-based design allows swapping between the
//! JSON-file store and an in-memory one for tests.

mod file;
mod memory;
mod read_state;
mod traits;

pub use file::FileWatermarkStore;
pub use memory::InMemoryWatermarkStore;
pub use read_state::ReadStateStore;
pub use traits::{WatermarkMap, WatermarkStore};
