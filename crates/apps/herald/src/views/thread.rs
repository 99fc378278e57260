//! Thread view for the interactive chat
//!
//! The terminal is append-only, so the printer remembers which messages
//! and errors it has already shown and only emits what is new.

use chat::{MessageId, Side, Snapshot};
use std::collections::HashSet;
use std::fmt::Write;

use super::format_timestamp;

#[derive(Default)]
pub struct ThreadPrinter {
    printed: HashSet<MessageId>,
    title: Option<String>,
    last_error: Option<String>,
    last_send_error: Option<String>,
}

impl ThreadPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text for whatever changed since the previous call
    pub fn update(&mut self, snapshot: &Snapshot) -> String {
        let mut out = String::new();
        let Some(thread) = &snapshot.thread else {
            return out;
        };

        if self.title.as_deref() != Some(thread.header.title.as_str()) {
            let _ = writeln!(
                out,
                "== {} ({}) ==",
                thread.header.title,
                thread.header.kind()
            );
            self.title = Some(thread.header.title.clone());
        }

        for group in &thread.groups {
            for (index, message) in group.messages.iter().enumerate() {
                if !self.printed.insert(message.id.clone()) {
                    continue;
                }
                if index == 0 {
                    let who = match group.side {
                        Side::Outbound => "me",
                        Side::Inbound => group.sender_label.as_deref().unwrap_or("unknown"),
                    };
                    let when = group.timestamp.map(format_timestamp).unwrap_or_default();
                    let _ = writeln!(out, "{} {}", who, when);
                }
                let marker = match group.side {
                    Side::Outbound => ">",
                    Side::Inbound => "|",
                };
                for line in message.body.lines() {
                    let _ = writeln!(out, "  {} {}", marker, line);
                }
            }
        }

        let error = thread.error.as_ref().map(ToString::to_string);
        if error != self.last_error {
            if let Some(e) = &error {
                let _ = writeln!(out, "! {}", e);
            }
            self.last_error = error;
        }

        let send_error = snapshot.send_error.as_ref().map(ToString::to_string);
        if send_error != self.last_send_error {
            if let Some(e) = &send_error {
                let _ = writeln!(
                    out,
                    "! {} (draft kept, press enter on an empty line to retry)",
                    e
                );
            }
            self.last_send_error = send_error;
        }

        out
    }
}
