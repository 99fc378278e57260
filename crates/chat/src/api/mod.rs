//! Relay backend access
//!
//! [`Backend`] is the seam between the sync engine and the network. The
//! production implementation is [`RelayClient`]; tests script their own.

mod auth;
mod client;
pub mod normalize;
pub mod wire;

pub use auth::{RelayAuth, StoredToken};
pub use client::RelayClient;

use crate::error::ApiError;
use crate::models::{
    ContactId, ContactProfile, Conversation, Message, MessageId, Stats, UserProfile,
};

/// Messages for one conversation as returned by the backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePage {
    /// Normalized messages in backend order (oldest first)
    pub messages: Vec<Message>,
    /// Number of rows the backend returned, before any filtering
    pub raw_count: usize,
}

/// Operations the chat engine needs from the relay backend.
///
/// Calls are blocking. The driver runs them on a blocking thread pool so
/// the polling loops never wait on the network.
pub trait Backend: Send + Sync {
    /// Every conversation the user can see, in backend order
    fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    /// Group conversations only
    fn list_groups(&self) -> Result<Vec<Conversation>, ApiError>;

    /// Full message history for one conversation
    fn list_messages(&self, contact_id: &ContactId) -> Result<MessagePage, ApiError>;

    /// A single message by id
    fn get_message(&self, id: &MessageId) -> Result<Message, ApiError>;

    /// Display metadata for one conversation
    fn contact_profile(&self, contact_id: &ContactId) -> Result<ContactProfile, ApiError>;

    /// Send `body` verbatim to `contact_id`
    fn send_message(&self, contact_id: &ContactId, body: &str) -> Result<(), ApiError>;

    fn user_profile(&self) -> Result<UserProfile, ApiError>;

    fn stats(&self) -> Result<Stats, ApiError>;
}

impl<T: Backend + ?Sized> Backend for std::sync::Arc<T> {
    fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        (**self).list_conversations()
    }

    fn list_groups(&self) -> Result<Vec<Conversation>, ApiError> {
        (**self).list_groups()
    }

    fn list_messages(&self, contact_id: &ContactId) -> Result<MessagePage, ApiError> {
        (**self).list_messages(contact_id)
    }

    fn get_message(&self, id: &MessageId) -> Result<Message, ApiError> {
        (**self).get_message(id)
    }

    fn contact_profile(&self, contact_id: &ContactId) -> Result<ContactProfile, ApiError> {
        (**self).contact_profile(contact_id)
    }

    fn send_message(&self, contact_id: &ContactId, body: &str) -> Result<(), ApiError> {
        (**self).send_message(contact_id, body)
    }

    fn user_profile(&self) -> Result<UserProfile, ApiError> {
        (**self).user_profile()
    }

    fn stats(&self) -> Result<Stats, ApiError> {
        (**self).stats()
    }
}
