//! Conversation list view

use chat::ConversationSummary;
use std::fmt::Write;

use super::format_timestamp;

/// One line per conversation, unread badge first
pub fn render_conversation_list(conversations: &[ConversationSummary]) -> String {
    if conversations.is_empty() {
        return "No conversations yet.\n".to_string();
    }

    let mut out = String::new();
    for conversation in conversations {
        let badge = if conversation.unread > 0 {
            format!("({:>3})", conversation.unread)
        } else {
            "     ".to_string()
        };
        let kind = if conversation.is_group { "#" } else { " " };
        let when = conversation
            .last_message_at
            .map(format_timestamp)
            .unwrap_or_default();

        let _ = write!(out, "{} {}{}", badge, kind, conversation.title);
        if conversation.title != conversation.contact_id.as_str() {
            let _ = write!(out, " <{}>", conversation.contact_id);
        }
        let _ = writeln!(out, "  {}", when);
    }
    out
}
