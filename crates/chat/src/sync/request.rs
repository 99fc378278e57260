//! Backend work produced by the engine and the results fed back to it
//!
//! The engine never calls the backend itself. It hands out [`Request`]s,
//! the caller executes them (inline, or on a blocking pool), and the
//! resulting [`Response`]s are applied in whatever order they finish.

use log::debug;

use super::Ticket;
use crate::api::{Backend, MessagePage};
use crate::error::ApiError;
use crate::models::{ContactId, ContactProfile, Conversation};

/// One unit of backend work
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Conversation list poll
    Conversations { ticket: Ticket },

    /// Thread poll for the active conversation
    Thread {
        ticket: Ticket,
        contact_id: ContactId,
        /// Also fetch contact metadata on this tick
        include_profile: bool,
    },

    /// Outgoing message from the compose box
    Send { contact_id: ContactId, body: String },
}

/// Outcome of a [`Request`]
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Conversations {
        ticket: Ticket,
        result: Result<Vec<Conversation>, ApiError>,
    },

    Thread {
        ticket: Ticket,
        contact_id: ContactId,
        messages: Result<MessagePage, ApiError>,
        /// `None` when metadata was not requested on this tick
        profile: Option<Result<ContactProfile, ApiError>>,
    },

    Sent {
        contact_id: ContactId,
        result: Result<(), ApiError>,
    },
}

impl Response {
    /// Whether any part of the response was rejected for missing credentials
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Response::Conversations { result, .. } => {
                result.as_ref().err().is_some_and(ApiError::is_unauthorized)
            }
            Response::Thread {
                messages, profile, ..
            } => {
                messages.as_ref().err().is_some_and(ApiError::is_unauthorized)
                    || profile
                        .as_ref()
                        .and_then(|p| p.as_ref().err())
                        .is_some_and(ApiError::is_unauthorized)
            }
            Response::Sent { result, .. } => {
                result.as_ref().err().is_some_and(ApiError::is_unauthorized)
            }
        }
    }
}

impl Request {
    /// The response this request yields when it fails as a whole with `error`
    pub fn fail(&self, error: ApiError) -> Response {
        match self {
            Request::Conversations { ticket } => Response::Conversations {
                ticket: *ticket,
                result: Err(error),
            },
            Request::Thread {
                ticket,
                contact_id,
                include_profile,
            } => Response::Thread {
                ticket: *ticket,
                contact_id: contact_id.clone(),
                profile: include_profile.then(|| Err(error.clone())),
                messages: Err(error),
            },
            Request::Send { contact_id, .. } => Response::Sent {
                contact_id: contact_id.clone(),
                result: Err(error),
            },
        }
    }

    /// Run the request against `backend`, blocking until it finishes
    pub fn execute(self, backend: &dyn Backend) -> Response {
        match self {
            Request::Conversations { ticket } => {
                debug!("Fetching conversations");
                Response::Conversations {
                    ticket,
                    result: backend.list_conversations(),
                }
            }
            Request::Thread {
                ticket,
                contact_id,
                include_profile,
            } => {
                debug!("Fetching messages for {}", contact_id);
                let messages = backend.list_messages(&contact_id);
                let profile = include_profile.then(|| backend.contact_profile(&contact_id));
                Response::Thread {
                    ticket,
                    contact_id,
                    messages,
                    profile,
                }
            }
            Request::Send { contact_id, body } => {
                debug!("Sending {} bytes to {}", body.len(), contact_id);
                let result = backend.send_message(&contact_id, &body);
                Response::Sent { contact_id, result }
            }
        }
    }
}
