//! Plain-text rendering of engine state

mod conversation_list;
mod thread;

pub use conversation_list::render_conversation_list;
pub use thread::ThreadPrinter;

use chrono::{DateTime, Local, Utc};

/// Time of day for today's messages, date and time otherwise
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    let local = timestamp.with_timezone(&Local);
    if local.date_naive() == Local::now().date_naive() {
        local.format("%H:%M").to_string()
    } else {
        local.format("%b %e %H:%M").to_string()
    }
}
