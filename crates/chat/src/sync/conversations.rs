//! Conversation list polling
//!
//! Each successful fetch replaces the list wholesale. A failed fetch keeps
//! the last good list visible and records the error; the timer keeps
//! running so the next tick retries.

use log::{debug, warn};
use std::time::{Duration, Instant};

use super::{Poller, Request, Ticket};
use crate::error::{ApiError, FetchError, Resource};
use crate::models::{ContactId, Conversation};
use crate::query::{ConversationSummary, summarize};
use crate::storage::ReadStateStore;

pub struct ConversationSync {
    poller: Poller,
    conversations: Vec<Conversation>,
    loaded: bool,
    last_error: Option<FetchError>,
}

impl ConversationSync {
    pub fn new(period: Duration) -> Self {
        Self {
            poller: Poller::new("conversations", period),
            conversations: Vec::new(),
            loaded: false,
            last_error: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.poller.start(now);
    }

    /// Stop polling; the last list stays available
    pub fn stop(&mut self) {
        self.poller.stop();
    }

    /// Fetch on the next poll regardless of the timer
    pub fn force(&mut self) -> bool {
        self.poller.force()
    }

    /// The fetch to run now, if one is due
    pub fn poll(&mut self, now: Instant) -> Option<Request> {
        self.poller
            .poll_due(now)
            .map(|ticket| Request::Conversations { ticket })
    }

    /// Apply a finished fetch. Returns `false` if the result was stale.
    pub fn apply(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<Conversation>, ApiError>,
        now: Instant,
    ) -> bool {
        if !self.poller.complete(ticket, now) {
            return false;
        }

        match result {
            Ok(conversations) => {
                debug!("Loaded {} conversations", conversations.len());
                self.conversations = conversations;
                self.loaded = true;
                self.last_error = None;
            }
            Err(e) => {
                let error = FetchError::new(Resource::Conversations, e);
                warn!("{}; keeping {} cached", error, self.conversations.len());
                self.last_error = Some(error);
            }
        }
        true
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, contact_id: &ContactId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.contact_id == contact_id)
    }

    /// Whether at least one fetch has succeeded
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.poller.next_deadline(now)
    }

    /// List entries with unread counts from `read_state`
    pub fn summaries(&self, read_state: &ReadStateStore) -> Vec<ConversationSummary> {
        summarize(&self.conversations, read_state)
    }
}
