//! Query API for UI consumption
//!
//! Turns synced state into data shaped for display: conversation
//! summaries with unread badges, thread headers, and message groups.

mod groups;
mod views;

pub use groups::{
    ClassifiedMessage, DisplayGroup, GroupHeader, MessageGroups, classify_and_group,
    group_messages,
};
pub use views::{ConversationSummary, GroupView, ThreadHeader, ThreadView, summarize};
