//! Compose box state for the send pipeline
//!
//! Sending happens in two steps:
//! 1. [`Composer::begin_send`] validates the draft and produces the request
//! 2. [`Composer::finish_send`] records the backend's answer
//!
//! Only one send may be outstanding. The draft stays editable meanwhile.
//! On success the draft is cleared only if it still holds the sent text;
//! on failure it is kept.

use log::{error, info};

use crate::error::{ApiError, SendError};
use crate::models::ContactId;
use crate::sync::Request;

#[derive(Debug, Default)]
pub struct Composer {
    draft: String,
    /// Body of the outstanding send
    pending: Option<String>,
    last_error: Option<SendError>,
    finished: u64,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Whether a send is waiting for the backend
    pub fn is_sending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_error(&self) -> Option<&SendError> {
        self.last_error.as_ref()
    }

    /// Number of sends that got an answer from the backend, either way
    pub fn finished_sends(&self) -> u64 {
        self.finished
    }

    /// Start sending the draft to `contact_id`.
    ///
    /// A blank draft is a no-op and returns `Ok(None)`. The draft text is
    /// sent as typed, without trimming.
    pub fn begin_send(&mut self, contact_id: &ContactId) -> Result<Option<Request>, SendError> {
        if self.pending.is_some() {
            return Err(SendError::Busy);
        }
        if self.draft.trim().is_empty() {
            return Ok(None);
        }

        self.pending = Some(self.draft.clone());
        self.last_error = None;
        Ok(Some(Request::Send {
            contact_id: contact_id.clone(),
            body: self.draft.clone(),
        }))
    }

    /// Record the outcome of the outstanding send
    pub fn finish_send(
        &mut self,
        contact_id: &ContactId,
        result: Result<(), ApiError>,
    ) -> Result<(), SendError> {
        let sent = self.pending.take();
        self.finished += 1;
        match result {
            Ok(()) => {
                info!("Message sent to {}", contact_id);
                if sent.as_deref() == Some(self.draft.as_str()) {
                    self.draft.clear();
                }
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                let err = SendError::Rejected(e);
                error!("{}", err);
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Remember a send attempt that never reached the backend
    pub(crate) fn record_error(&mut self, err: SendError) {
        self.last_error = Some(err);
    }
}
