//! Domain models for chat entities

mod conversation;
mod message;
mod profile;

pub use conversation::{ContactId, Conversation};
pub use message::{Message, MessageBuilder, MessageId, OutgoingFlag};
pub use profile::{ContactProfile, Stats, UserProfile};
