//! Contact metadata and account profile models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContactId;

/// Metadata for the active conversation's contact or group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactProfile {
    pub contact_id: ContactId,
    pub display_name: Option<String>,
    pub is_group: bool,
    pub group_id: Option<String>,
    /// Message count as reported alongside the profile
    pub message_count: Option<u64>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl ContactProfile {
    /// Profile with nothing known beyond the id
    pub fn bare(contact_id: ContactId) -> Self {
        Self {
            contact_id,
            display_name: None,
            is_group: false,
            group_id: None,
            message_count: None,
            last_message_at: None,
        }
    }
}

/// The logged-in user's account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserProfile {
    /// "First Last", or the username when neither name is set
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Message statistics for the account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_messages: u64,
    pub total_conversations: u64,
    pub total_groups: Option<u64>,
}
