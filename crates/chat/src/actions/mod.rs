//! User actions on the chat engine
//!
//! Opening conversations, composing and sending go through [`ChatEngine`],
//! which coordinates the read-state store with both sync loops.

mod composer;
mod engine;

pub use composer::Composer;
pub use engine::{ChatEngine, Snapshot};
