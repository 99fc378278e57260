//! Chat crate - Sync and presentation engine for the relay client
//!
//! This crate provides platform-independent chat functionality including:
//! - Domain models (Conversation, Message, ContactProfile)
//! - Relay backend client and bearer-token authentication
//! - Persistent per-conversation read watermarks
//! - Outgoing-message classification and display grouping
//! - Conversation and thread polling loops with a send pipeline
//! - An async driver that runs the engine on tokio
//!
//! This crate has zero UI dependencies.

pub mod actions;
pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod storage;
pub mod sync;

pub use actions::{ChatEngine, Composer, Snapshot};
pub use api::{Backend, MessagePage, RelayAuth, RelayClient};
pub use classify::{ClassificationRule, Classifier, LocalIdentities, Side, is_outgoing};
pub use config::ClientConfig;
pub use error::{ApiError, FetchError, PersistenceWarning, Resource, SendError};
pub use models::{
    ContactId, ContactProfile, Conversation, Message, MessageId, OutgoingFlag, Stats, UserProfile,
};
pub use query::{
    ConversationSummary, DisplayGroup, GroupView, ThreadHeader, ThreadView, classify_and_group,
    group_messages,
};
pub use storage::{FileWatermarkStore, InMemoryWatermarkStore, ReadStateStore, WatermarkStore};
pub use sync::{
    // Loops
    ConversationSync, ThreadSync,
    // Scheduling
    PollState, Poller, Ticket,
    // Driver plumbing
    Command, DriverHandle, Request, Response,
};
