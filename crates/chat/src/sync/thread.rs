//! Active thread polling
//!
//! Only one conversation is active at a time. Switching to another one
//! restarts the poller, which invalidates anything still in flight for the
//! previous conversation, and clears every piece of thread state so no
//! message from the old conversation can show up in the new one.
//!
//! Messages whose body is empty or whitespace are dropped here and never
//! reach the classifier or grouper. They still count toward the backend's
//! `message_count`, so the unread badge may exceed what the thread shows.

use log::{debug, warn};
use std::time::{Duration, Instant};

use super::{Poller, Request, Ticket};
use crate::api::MessagePage;
use crate::classify::Classifier;
use crate::error::{ApiError, FetchError, Resource};
use crate::models::{ContactId, ContactProfile, Message};
use crate::query::{ClassifiedMessage, MessageGroups, ThreadHeader, classify_and_group};

/// What a successful thread fetch asks the caller to do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadUpdate {
    pub contact_id: ContactId,
    /// Count to record as read, when the fetch produced visible messages
    pub mark_read: Option<u64>,
}

pub struct ThreadSync {
    poller: Poller,
    active: Option<ContactId>,
    messages: Vec<Message>,
    raw_count: usize,
    profile: Option<ContactProfile>,
    profile_pending: bool,
    last_error: Option<FetchError>,
}

impl ThreadSync {
    pub fn new(period: Duration) -> Self {
        Self {
            poller: Poller::new("thread", period),
            active: None,
            messages: Vec::new(),
            raw_count: 0,
            profile: None,
            profile_pending: false,
            last_error: None,
        }
    }

    /// Make `contact_id` the active conversation and fetch immediately
    pub fn switch_to(&mut self, contact_id: ContactId, now: Instant) {
        debug!("Activating thread {}", contact_id);
        self.reset();
        self.active = Some(contact_id);
        self.profile_pending = true;
        self.poller.start(now);
    }

    /// Stop polling and forget the active conversation
    pub fn close(&mut self) {
        if let Some(id) = &self.active {
            debug!("Closing thread {}", id);
        }
        self.poller.stop();
        self.reset();
        self.active = None;
    }

    fn reset(&mut self) {
        self.messages.clear();
        self.raw_count = 0;
        self.profile = None;
        self.profile_pending = false;
        self.last_error = None;
    }

    pub fn force(&mut self) -> bool {
        self.poller.force()
    }

    /// The fetch to run now, if one is due
    pub fn poll(&mut self, now: Instant) -> Option<Request> {
        let contact_id = self.active.clone()?;
        let ticket = self.poller.poll_due(now)?;
        Some(Request::Thread {
            ticket,
            contact_id,
            include_profile: self.profile_pending,
        })
    }

    /// Apply a finished fetch.
    ///
    /// Returns `None` when the result belongs to a cancelled run.
    pub fn apply(
        &mut self,
        ticket: Ticket,
        contact_id: &ContactId,
        messages: Result<MessagePage, ApiError>,
        profile: Option<Result<ContactProfile, ApiError>>,
        now: Instant,
    ) -> Option<ThreadUpdate> {
        if self.active.as_ref() != Some(contact_id) || !self.poller.complete(ticket, now) {
            debug!("Dropping thread result for {}", contact_id);
            return None;
        }

        let mut profile_error = None;
        match profile {
            Some(Ok(profile)) => {
                self.profile = Some(profile);
                self.profile_pending = false;
            }
            Some(Err(e)) => {
                let error = FetchError::new(Resource::ContactProfile, e);
                warn!("{}; will retry on next tick", error);
                profile_error = Some(error);
            }
            None => {}
        }

        let mut mark_read = None;
        match messages {
            Ok(page) => {
                self.raw_count = page.raw_count;
                self.messages = page
                    .messages
                    .into_iter()
                    .filter(Message::has_visible_body)
                    .collect();

                let dropped = page.raw_count.saturating_sub(self.messages.len());
                if dropped > 0 {
                    debug!("Filtered {} empty messages from {}", dropped, contact_id);
                }

                if !self.messages.is_empty() {
                    mark_read = Some(self.reported_count());
                }
                self.last_error = profile_error;
            }
            Err(e) => {
                let error = FetchError::new(Resource::Messages, e);
                warn!("{}; keeping {} cached", error, self.messages.len());
                self.last_error = Some(error);
            }
        }

        Some(ThreadUpdate {
            contact_id: contact_id.clone(),
            mark_read,
        })
    }

    pub fn active(&self) -> Option<&ContactId> {
        self.active.as_ref()
    }

    /// Visible messages in backend order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Rows in the last successful fetch, including filtered ones
    pub fn raw_count(&self) -> usize {
        self.raw_count
    }

    pub fn profile(&self) -> Option<&ContactProfile> {
        self.profile.as_ref()
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

    /// Message count recorded when the thread is viewed.
    ///
    /// The profile's count is only fetched once per activation, so the
    /// latest fetch's row count wins once it has grown past it.
    pub fn reported_count(&self) -> u64 {
        let profile_count = self
            .profile
            .as_ref()
            .and_then(|p| p.message_count)
            .unwrap_or(0);
        profile_count.max(self.raw_count as u64)
    }

    pub fn header(&self) -> Option<ThreadHeader> {
        let contact_id = self.active.as_ref()?;
        Some(ThreadHeader::new(
            contact_id,
            self.profile.as_ref(),
            self.messages.len(),
        ))
    }

    /// Display groups for the visible messages
    pub fn groups<'a>(
        &'a self,
        classifier: &'a Classifier,
    ) -> MessageGroups<'a, impl Iterator<Item = ClassifiedMessage<'a>>> {
        classify_and_group(&self.messages, classifier)
    }
}
