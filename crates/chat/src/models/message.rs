//! Message model representing one entry in a conversation's stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a message within a conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The backend's "sent by me" signal.
///
/// Some rows report it as a boolean and some as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutgoingFlag {
    Bool(bool),
    Int(i64),
}

impl OutgoingFlag {
    /// `true` or `1`; every other value counts as unset
    pub fn is_set(self) -> bool {
        matches!(self, OutgoingFlag::Bool(true) | OutgoingFlag::Int(1))
    }
}

/// A single message as fetched on one poll tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Backend message ID, stable across polls
    pub id: MessageId,
    /// Message text
    pub body: String,
    /// Author's number, if known
    pub sender_number: Option<String>,
    /// Author's name, if known
    pub sender_name: Option<String>,
    /// Backend's outgoing flag, when the row carries one
    pub outgoing: Option<OutgoingFlag>,
    /// When the message was received
    pub received_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a new message builder
    pub fn builder(id: impl Into<MessageId>) -> MessageBuilder {
        MessageBuilder::new(id.into())
    }

    /// Whether the body has anything to show.
    ///
    /// Rows failing this are dropped before classification and grouping.
    pub fn has_visible_body(&self) -> bool {
        !self.body.trim().is_empty()
    }

    /// Label for a sender header: name first, then number
    pub fn sender_label(&self) -> Option<&str> {
        self.sender_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.sender_number.as_deref())
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: MessageId,
    body: String,
    sender_number: Option<String>,
    sender_name: Option<String>,
    outgoing: Option<OutgoingFlag>,
    received_at: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    fn new(id: MessageId) -> Self {
        Self {
            id,
            body: String::new(),
            sender_number: None,
            sender_name: None,
            outgoing: None,
            received_at: None,
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn sender_number(mut self, number: impl Into<String>) -> Self {
        self.sender_number = Some(number.into());
        self
    }

    pub fn sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn outgoing(mut self, flag: OutgoingFlag) -> Self {
        self.outgoing = Some(flag);
        self
    }

    pub fn received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            body: self.body,
            sender_number: self.sender_number,
            sender_name: self.sender_name,
            outgoing: self.outgoing,
            received_at: self.received_at,
        }
    }
}
