//! Relay response normalization
//!
//! Converts wire rows to domain models. Rows that cannot be identified
//! (no contact number, no message id) are skipped here; rows with a
//! missing or non-string body become messages with an empty body so the
//! thread sync can drop them while they still count as fetched.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::debug;
use serde_json::Value;

use super::MessagePage;
use super::wire::{
    ContactProfileResponse, StatsResponse, UserProfileResponse, WireConversation, WireMessage,
};
use crate::models::{
    ContactId, ContactProfile, Conversation, Message, MessageId, OutgoingFlag, Stats, UserProfile,
};

/// Normalize a conversation row; rows without a contact number are dropped
pub fn normalize_conversation(row: WireConversation) -> Option<Conversation> {
    let Some(contact_number) = row.contact_number.filter(|n| !n.is_empty()) else {
        debug!("Skipping conversation row without contact number: {:?}", row.id);
        return None;
    };

    Some(Conversation {
        contact_id: ContactId::new(contact_number),
        display_name: row.contact_name,
        is_group: row.is_group.unwrap_or(false),
        message_count: row.message_count.unwrap_or(0),
        last_message_at: row.last_message_at.as_deref().and_then(parse_timestamp),
    })
}

/// Normalize a full conversation list, keeping backend order
pub fn normalize_conversations(rows: Vec<WireConversation>) -> Vec<Conversation> {
    rows.into_iter().filter_map(normalize_conversation).collect()
}

/// Normalize one message row; rows without an id are dropped
pub fn normalize_message(row: WireMessage) -> Option<Message> {
    let Some(id) = row.id.as_ref().and_then(value_to_id) else {
        debug!("Skipping message row without id");
        return None;
    };

    let body = match row.message_body {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };

    let received_at = row
        .received_at
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| row.timestamp.and_then(|ms| Utc.timestamp_millis_opt(ms).single()));

    Some(Message {
        id: MessageId::new(id),
        body,
        sender_number: row.sender_number,
        sender_name: row.sender_name,
        outgoing: row.is_outgoing.as_ref().and_then(value_to_flag),
        received_at,
    })
}

/// Normalize a page of messages, remembering how many rows came in
pub fn normalize_messages(rows: Vec<WireMessage>) -> MessagePage {
    let raw_count = rows.len();
    let messages = rows.into_iter().filter_map(normalize_message).collect();
    MessagePage {
        messages,
        raw_count,
    }
}

/// Normalize contact metadata for `contact_id`
pub fn normalize_contact_profile(
    contact_id: &ContactId,
    resp: ContactProfileResponse,
) -> ContactProfile {
    ContactProfile {
        contact_id: resp
            .contact_number
            .filter(|n| !n.is_empty())
            .map(ContactId::new)
            .unwrap_or_else(|| contact_id.clone()),
        display_name: resp.contact_name,
        is_group: resp.is_group.unwrap_or(false),
        group_id: resp.group_id,
        message_count: resp.message_count,
        last_message_at: resp.last_message_at.as_deref().and_then(parse_timestamp),
    }
}

pub fn normalize_user_profile(resp: UserProfileResponse) -> UserProfile {
    UserProfile {
        username: resp.username,
        email: resp.email.filter(|e| !e.is_empty()),
        first_name: resp.first_name.filter(|n| !n.is_empty()),
        last_name: resp.last_name.filter(|n| !n.is_empty()),
    }
}

pub fn normalize_stats(resp: StatsResponse) -> Stats {
    Stats {
        total_messages: resp.total_messages.unwrap_or(0),
        total_conversations: resp.total_conversations.unwrap_or(0),
        total_groups: resp.total_groups,
    }
}

/// Parse RFC 3339, falling back to a naive `YYYY-MM-DD HH:MM:SS` taken as UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_flag(value: &Value) -> Option<OutgoingFlag> {
    match value {
        Value::Bool(b) => Some(OutgoingFlag::Bool(*b)),
        Value::Number(n) => n.as_i64().map(OutgoingFlag::Int),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::wire::{ConversationsResponse, MessagesResponse};

    #[test]
    fn test_normalize_conversations() {
        let json = r#"{
            "conversations": [
                {"id": 1, "contact_number": "+15550001", "contact_name": "Alice",
                 "is_group": false, "message_count": 12,
                 "last_message_at": "2024-05-01T10:00:00Z"},
                {"id": 2, "contact_number": "abc=", "is_group": true, "message_count": null},
                {"id": 3, "contact_name": "No number"}
            ]
        }"#;
        let resp: ConversationsResponse = serde_json::from_str(json).unwrap();
        let conversations = normalize_conversations(resp.conversations);

        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].contact_id.as_str(), "+15550001");
        assert_eq!(conversations[0].message_count, 12);
        assert!(conversations[0].last_message_at.is_some());
        assert!(conversations[1].is_group);
        assert_eq!(conversations[1].message_count, 0);
        assert_eq!(conversations[1].title(), "abc=");
    }

    #[test]
    fn test_normalize_messages_keeps_empty_bodies_and_raw_count() {
        let json = r#"{
            "messages": [
                {"id": 10, "message_body": "hi", "sender_number": "+15550001",
                 "is_outgoing": 0, "received_at": "2024-05-01T10:00:00+02:00"},
                {"id": "11", "message_body": null, "is_outgoing": true},
                {"id": 12, "message_body": 42, "is_outgoing": 1, "timestamp": 1714550400000},
                {"message_body": "orphan"}
            ]
        }"#;
        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        let page = normalize_messages(resp.messages);

        assert_eq!(page.raw_count, 4);
        assert_eq!(page.messages.len(), 3);

        let first = &page.messages[0];
        assert_eq!(first.id.as_str(), "10");
        assert_eq!(first.body, "hi");
        assert_eq!(first.outgoing, Some(OutgoingFlag::Int(0)));
        assert_eq!(
            first.received_at.unwrap().to_rfc3339(),
            "2024-05-01T08:00:00+00:00"
        );

        assert_eq!(page.messages[1].body, "");
        assert_eq!(page.messages[1].outgoing, Some(OutgoingFlag::Bool(true)));
        assert_eq!(page.messages[2].body, "");
        assert!(page.messages[2].received_at.is_some());
    }

    #[test]
    fn test_unknown_outgoing_value_is_ignored() {
        let row: WireMessage =
            serde_json::from_str(r#"{"id": 1, "message_body": "x", "is_outgoing": "yes"}"#)
                .unwrap();
        let msg = normalize_message(row).unwrap();
        assert_eq!(msg.outgoing, None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-05-01 10:00:00").is_some());
        assert!(parse_timestamp("2024-05-01T10:00:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_profile_falls_back_to_requested_contact() {
        let resp: ContactProfileResponse =
            serde_json::from_str(r#"{"contact_name": "Team", "is_group": true}"#).unwrap();
        let profile = normalize_contact_profile(&ContactId::new("grp="), resp);
        assert_eq!(profile.contact_id.as_str(), "grp=");
        assert_eq!(profile.display_name.as_deref(), Some("Team"));
        assert!(profile.is_group);
        assert_eq!(profile.message_count, None);
    }
}
