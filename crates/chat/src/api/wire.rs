//! Relay backend request and response types
//!
//! These mirror the JSON the backend speaks. Fields the backend is known
//! to omit or send with inconsistent types are optional or kept as raw
//! JSON values and sorted out in [`super::normalize`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response from `GET /api/conversations/` and `GET /api/groups/`
#[derive(Debug, Deserialize)]
pub struct ConversationsResponse {
    #[serde(default)]
    pub conversations: Vec<WireConversation>,
}

/// One conversation row
#[derive(Debug, Deserialize)]
pub struct WireConversation {
    pub id: Option<Value>,
    pub contact_number: Option<String>,
    pub contact_name: Option<String>,
    pub is_group: Option<bool>,
    pub group_id: Option<String>,
    pub message_count: Option<u64>,
    pub last_message_at: Option<String>,
}

/// Response from `GET /api/messages/`
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

/// One message row
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    /// Integer or string depending on the backend version
    pub id: Option<Value>,
    /// Usually a string; null and non-string values occur
    pub message_body: Option<Value>,
    pub sender_number: Option<String>,
    pub sender_name: Option<String>,
    /// `true`/`false` or `1`/`0`
    pub is_outgoing: Option<Value>,
    pub received_at: Option<String>,
    /// Milliseconds since epoch
    pub timestamp: Option<i64>,
}

/// Response from `GET /api/contact/profile/`
#[derive(Debug, Deserialize)]
pub struct ContactProfileResponse {
    pub contact_number: Option<String>,
    pub contact_name: Option<String>,
    pub is_group: Option<bool>,
    pub group_id: Option<String>,
    pub message_count: Option<u64>,
    pub last_message_at: Option<String>,
}

/// Body of `POST /api/send/`
#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub to: &'a str,
    pub message: &'a str,
}

/// Response from `GET /api/profile/`
#[derive(Debug, Deserialize)]
pub struct UserProfileResponse {
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Response from `GET /api/stats/`
#[derive(Debug, Deserialize)]
pub struct StatsResponse {
    pub total_messages: Option<u64>,
    pub total_conversations: Option<u64>,
    pub total_groups: Option<u64>,
}

/// Error body the backend attaches to failures
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}

/// Body of `POST /api/token/`
#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body of `POST /api/token/refresh/`
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Response from the token endpoints
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access: String,
    pub refresh: Option<String>,
}
