//! Error taxonomy for the chat engine
//!
//! None of these are fatal. Fetch errors are retried by the next poll
//! tick, send errors are surfaced to the user with the draft preserved,
//! and persistence warnings leave the in-memory read state in place.

/// Error from a single backend call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The bearer token was missing, expired, or revoked
    #[error("Authentication required")]
    Unauthorized,

    /// Backend answered with a non-success status
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Request never produced a response
    #[error("Network error: {0}")]
    Transport(String),

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// Which poll produced a [`FetchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Conversations,
    Messages,
    ContactProfile,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Resource::Conversations => "conversations",
            Resource::Messages => "messages",
            Resource::ContactProfile => "contact info",
        };
        f.write_str(name)
    }
}

/// A poll failed; the previous data stays visible and the next tick retries
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Failed to load {resource}: {source}")]
pub struct FetchError {
    pub resource: Resource,
    #[source]
    pub source: ApiError,
}

impl FetchError {
    pub fn new(resource: Resource, source: ApiError) -> Self {
        Self { resource, source }
    }
}

/// A send attempt did not go through; the draft is kept
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SendError {
    /// Another send from the same compose box is still outstanding
    #[error("A message is already being sent")]
    Busy,

    /// No conversation is open to send to
    #[error("No conversation selected")]
    NoConversation,

    /// Backend refused or failed the send
    #[error("Failed to send message: {0}")]
    Rejected(#[from] ApiError),
}

/// Read-state persistence failed; the engine keeps its in-memory state
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersistenceWarning {
    #[error("Could not load read state from {location}: {message}")]
    Load { location: String, message: String },

    #[error("Could not save read state to {location}: {message}")]
    Save { location: String, message: String },
}
