//! Conversation model representing a one-to-one chat or a group

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a conversation (phone number or group id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub String);

impl ContactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContactId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A conversation as reported by the backend on one poll tick.
///
/// Never persisted locally; the whole list is replaced on every
/// successful conversation sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Phone number or group id
    pub contact_id: ContactId,
    /// Contact or group name, if the backend knows one
    pub display_name: Option<String>,
    /// Whether this conversation is a group
    pub is_group: bool,
    /// Total messages the backend has observed for this conversation
    pub message_count: u64,
    /// Timestamp of the most recent message
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Create a one-to-one conversation with no name and no timestamp
    pub fn new(contact_id: impl Into<ContactId>, message_count: u64) -> Self {
        Self {
            contact_id: contact_id.into(),
            display_name: None,
            is_group: false,
            message_count,
            last_message_at: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn group(mut self) -> Self {
        self.is_group = true;
        self
    }

    pub fn with_last_message_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_message_at = Some(at);
        self
    }

    /// Name to show in lists, falling back to the raw contact id
    pub fn title(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(self.contact_id.as_str())
    }
}
