//! View types handed to the presentation layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DisplayGroup;
use crate::classify::Side;
use crate::error::FetchError;
use crate::models::{ContactId, ContactProfile, Conversation, Message};
use crate::storage::ReadStateStore;

/// A conversation list entry with its unread badge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub contact_id: ContactId,
    /// Display name, falling back to the contact id
    pub title: String,
    pub is_group: bool,
    /// Raw backend message count, used for unread math
    pub message_count: u64,
    pub last_message_at: Option<DateTime<Utc>>,
    /// `max(0, message_count - watermark)`
    pub unread: u64,
}

impl ConversationSummary {
    pub fn new(conversation: &Conversation, read_state: &ReadStateStore) -> Self {
        Self {
            contact_id: conversation.contact_id.clone(),
            title: conversation.title().to_string(),
            is_group: conversation.is_group,
            message_count: conversation.message_count,
            last_message_at: conversation.last_message_at,
            unread: read_state.unread(conversation),
        }
    }
}

/// Summaries for a whole conversation list, in backend order
pub fn summarize(
    conversations: &[Conversation],
    read_state: &ReadStateStore,
) -> Vec<ConversationSummary> {
    conversations
        .iter()
        .map(|c| ConversationSummary::new(c, read_state))
        .collect()
}

/// Header for the open thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadHeader {
    pub contact_id: ContactId,
    /// Contact or group name, or the raw contact id when unknown
    pub title: String,
    pub is_group: bool,
    /// Number of messages actually shown (after filtering)
    pub visible_messages: usize,
}

impl ThreadHeader {
    /// Build from whatever metadata is available; missing metadata
    /// falls back to the raw contact id
    pub fn new(
        contact_id: &ContactId,
        profile: Option<&ContactProfile>,
        visible_messages: usize,
    ) -> Self {
        let title = profile
            .and_then(|p| p.display_name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(contact_id.as_str())
            .to_string();
        Self {
            contact_id: contact_id.clone(),
            title,
            is_group: profile.is_some_and(|p| p.is_group),
            visible_messages,
        }
    }

    /// "Group" or "Individual"
    pub fn kind(&self) -> &'static str {
        if self.is_group { "Group" } else { "Individual" }
    }
}

/// Owned copy of a [`DisplayGroup`], detached from the sync state
#[derive(Debug, Clone, PartialEq)]
pub struct GroupView {
    pub side: Side,
    /// Shown above the first message; `None` for outbound groups
    pub sender_label: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub messages: Vec<Message>,
}

impl From<&DisplayGroup<'_>> for GroupView {
    fn from(group: &DisplayGroup<'_>) -> Self {
        let header = group.header();
        Self {
            side: group.side,
            sender_label: header.sender_label.map(str::to_string),
            timestamp: header.timestamp,
            messages: group.messages.iter().map(|&m| m.clone()).collect(),
        }
    }
}

/// Everything needed to render the open thread
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadView {
    pub header: ThreadHeader,
    pub groups: Vec<GroupView>,
    /// Last failed fetch; the groups above are the last good data
    pub error: Option<FetchError>,
}
