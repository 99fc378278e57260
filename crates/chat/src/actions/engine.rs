//! Chat engine facade
//!
//! [`ChatEngine`] owns the read-state store, both sync loops, the compose
//! box and the classifier. It is a plain state machine: callers feed it
//! the current time and backend responses, and it hands back the requests
//! to run. The async driver and the tests both drive it this way.

use log::{info, warn};
use std::time::{Duration, Instant};

use super::Composer;
use crate::api::Backend;
use crate::classify::{Classifier, LocalIdentities};
use crate::config::ClientConfig;
use crate::error::{ApiError, FetchError, PersistenceWarning, SendError};
use crate::models::ContactId;
use crate::query::{ConversationSummary, GroupView, ThreadView};
use crate::storage::ReadStateStore;
use crate::sync::{ConversationSync, Request, Response, ThreadSync};

/// Point-in-time view of everything the presentation layer shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub conversations: Vec<ConversationSummary>,
    /// Whether the conversation list has loaded at least once
    pub conversations_loaded: bool,
    pub conversation_error: Option<FetchError>,
    pub thread: Option<ThreadView>,
    pub draft: String,
    pub sending: bool,
    /// Sends answered by the backend so far, successful or not
    pub sends_finished: u64,
    pub send_error: Option<SendError>,
    pub persistence_warning: Option<PersistenceWarning>,
    /// The backend rejected our credentials; the user must log in again
    pub unauthorized: bool,
}

pub struct ChatEngine {
    read_state: ReadStateStore,
    classifier: Classifier,
    conversations: ConversationSync,
    thread: ThreadSync,
    composer: Composer,
    persistence_warning: Option<PersistenceWarning>,
    unauthorized: bool,
}

impl ChatEngine {
    /// Create an engine using the configured identities and poll periods
    pub fn new(config: &ClientConfig, read_state: ReadStateStore) -> Self {
        let classifier = Classifier::new(LocalIdentities::from_numbers(&config.local_numbers));
        Self::with_parts(
            read_state,
            classifier,
            config.conversation_poll,
            config.thread_poll,
        )
    }

    pub fn with_parts(
        read_state: ReadStateStore,
        classifier: Classifier,
        conversation_poll: Duration,
        thread_poll: Duration,
    ) -> Self {
        Self {
            read_state,
            classifier,
            conversations: ConversationSync::new(conversation_poll),
            thread: ThreadSync::new(thread_poll),
            composer: Composer::new(),
            persistence_warning: None,
            unauthorized: false,
        }
    }

    /// Load persisted watermarks, keeping the warning if the blob is unusable
    pub fn load_read_state(&mut self) -> usize {
        match self.read_state.load_all() {
            Ok(count) => count,
            Err(warning) => {
                self.persistence_warning = Some(warning);
                0
            }
        }
    }

    /// Start the conversation list poll
    pub fn start(&mut self, now: Instant) {
        self.conversations.start(now);
    }

    /// Stop both loops; in-flight results will be discarded
    pub fn stop(&mut self) {
        self.conversations.stop();
        self.thread.close();
    }

    /// Open a conversation from the list.
    ///
    /// The conversation is marked read at its current count before the
    /// thread activates, so the list shows it with zero unread from the
    /// next tick on.
    pub fn open_conversation(&mut self, contact_id: ContactId, now: Instant) {
        if let Some(count) = self.conversations.get(&contact_id).map(|c| c.message_count) {
            self.mark_read(&contact_id, count);
        }
        info!("Opening conversation {}", contact_id);
        self.thread.switch_to(contact_id, now);
    }

    /// Start a conversation that may not be in the list yet
    pub fn start_new_chat(&mut self, contact_id: ContactId, now: Instant) {
        self.mark_read(&contact_id, 0);
        info!("Starting new chat with {}", contact_id);
        self.thread.switch_to(contact_id, now);
    }

    pub fn close_thread(&mut self) {
        self.thread.close();
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.composer.set_draft(text);
    }

    /// Begin sending the draft to the active conversation.
    ///
    /// Returns the request to run, or `Ok(None)` for a blank draft.
    pub fn send(&mut self) -> Result<Option<Request>, SendError> {
        let Some(contact_id) = self.thread.active().cloned() else {
            self.composer.record_error(SendError::NoConversation);
            return Err(SendError::NoConversation);
        };
        self.composer.begin_send(&contact_id).inspect_err(|e| {
            warn!("{}", e);
            self.composer.record_error(e.clone());
        })
    }

    /// Send the draft and wait for the backend, blocking the caller
    pub fn send_blocking(&mut self, backend: &dyn Backend) -> Result<(), SendError> {
        let Some(Request::Send { contact_id, body }) = self.send()? else {
            return Ok(());
        };
        let result = backend.send_message(&contact_id, &body);
        self.on_sent(&contact_id, result)
    }

    /// Fetch both loops now instead of waiting for their timers
    pub fn refresh(&mut self) {
        self.conversations.force();
        self.thread.force();
    }

    /// Requests that are due at `now`
    pub fn due_requests(&mut self, now: Instant) -> Vec<Request> {
        let mut requests = Vec::with_capacity(2);
        requests.extend(self.conversations.poll(now));
        requests.extend(self.thread.poll(now));
        requests
    }

    /// Feed a finished request back into the engine
    pub fn apply(&mut self, response: Response, now: Instant) {
        if response.is_unauthorized() {
            if !self.unauthorized {
                warn!("Backend rejected credentials");
            }
            self.unauthorized = true;
        }

        match response {
            Response::Conversations { ticket, result } => {
                let ok = result.is_ok();
                if self.conversations.apply(ticket, result, now) && ok {
                    self.unauthorized = false;
                }
            }
            Response::Thread {
                ticket,
                contact_id,
                messages,
                profile,
            } => {
                let update = self.thread.apply(ticket, &contact_id, messages, profile, now);
                if let Some(count) = update.and_then(|u| u.mark_read) {
                    self.mark_read(&contact_id, count);
                }
            }
            Response::Sent { contact_id, result } => {
                let _ = self.on_sent(&contact_id, result);
            }
        }
    }

    /// Run every due request inline against `backend` until nothing is due.
    ///
    /// Returns the number of requests executed.
    pub fn pump(&mut self, backend: &dyn Backend, now: Instant) -> usize {
        let mut executed = 0;
        loop {
            let requests = self.due_requests(now);
            if requests.is_empty() {
                return executed;
            }
            for request in requests {
                let response = request.execute(backend);
                self.apply(response, now);
                executed += 1;
            }
        }
    }

    /// Earliest instant at which a request may become due
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        match (
            self.conversations.next_deadline(now),
            self.thread.next_deadline(now),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let thread = self.thread.header().map(|header| ThreadView {
            header,
            groups: self
                .thread
                .groups(&self.classifier)
                .map(|g| GroupView::from(&g))
                .collect(),
            error: self.thread.last_error().cloned(),
        });

        Snapshot {
            conversations: self.conversations.summaries(&self.read_state),
            conversations_loaded: self.conversations.is_loaded(),
            conversation_error: self.conversations.last_error().cloned(),
            thread,
            draft: self.composer.draft().to_string(),
            sending: self.composer.is_sending(),
            sends_finished: self.composer.finished_sends(),
            send_error: self.composer.last_error().cloned(),
            persistence_warning: self.persistence_warning.clone(),
            unauthorized: self.unauthorized,
        }
    }

    pub fn read_state(&self) -> &ReadStateStore {
        &self.read_state
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn conversations(&self) -> &ConversationSync {
        &self.conversations
    }

    pub fn thread(&self) -> &ThreadSync {
        &self.thread
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn is_unauthorized(&self) -> bool {
        self.unauthorized
    }

    fn on_sent(
        &mut self,
        contact_id: &ContactId,
        result: Result<(), ApiError>,
    ) -> Result<(), SendError> {
        self.composer.finish_send(contact_id, result)?;
        self.thread.force();
        self.conversations.force();
        Ok(())
    }

    fn mark_read(&mut self, contact_id: &ContactId, count: u64) {
        if let Err(warning) = self.read_state.mark_read(contact_id, count) {
            self.persistence_warning = Some(warning);
        }
    }
}
