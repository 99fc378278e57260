//! Per-conversation read watermarks
//!
//! The watermark for a conversation is the backend message count observed
//! the last time the user read it. Entries only move forward. Every change
//! is written through to the backing [`WatermarkStore`] before `mark_read`
//! returns; a failed write is reported but the in-memory value stays.

use log::{debug, warn};
use std::collections::HashMap;

use super::{WatermarkMap, WatermarkStore};
use crate::error::PersistenceWarning;
use crate::models::{ContactId, Conversation};

/// Owned read-state for all conversations
pub struct ReadStateStore {
    watermarks: HashMap<ContactId, u64>,
    backend: Box<dyn WatermarkStore>,
}

impl ReadStateStore {
    /// Create an empty store without touching the backend
    pub fn new(backend: Box<dyn WatermarkStore>) -> Self {
        Self {
            watermarks: HashMap::new(),
            backend,
        }
    }

    /// Replace in-memory state with the persisted map.
    ///
    /// Returns the number of entries loaded. On a corrupt or unreadable
    /// blob the store is reset to empty and the warning is returned.
    pub fn load_all(&mut self) -> Result<usize, PersistenceWarning> {
        self.watermarks.clear();
        match self.backend.load() {
            Ok(Some(map)) => {
                self.watermarks = map
                    .into_iter()
                    .map(|(k, v)| (ContactId::new(k), v))
                    .collect();
                debug!(
                    "Loaded {} read watermarks from {}",
                    self.watermarks.len(),
                    self.backend.location()
                );
                Ok(self.watermarks.len())
            }
            Ok(None) => Ok(0),
            Err(e) => {
                let warning = PersistenceWarning::Load {
                    location: self.backend.location(),
                    message: format!("{:#}", e),
                };
                warn!("{}; starting with empty read state", warning);
                Err(warning)
            }
        }
    }

    /// Watermark for a conversation; 0 if it was never opened
    pub fn get(&self, contact_id: &ContactId) -> u64 {
        self.watermarks.get(contact_id).copied().unwrap_or(0)
    }

    /// Raise the watermark to `message_count` if that is higher.
    ///
    /// Returns `Ok(true)` when the watermark advanced and was persisted,
    /// `Ok(false)` when it was already at or above `message_count`.
    pub fn mark_read(
        &mut self,
        contact_id: &ContactId,
        message_count: u64,
    ) -> Result<bool, PersistenceWarning> {
        let current = self.get(contact_id);
        if message_count <= current {
            return Ok(false);
        }

        self.watermarks.insert(contact_id.clone(), message_count);
        debug!(
            "Marked {} read at {} (was {})",
            contact_id, message_count, current
        );

        if let Err(e) = self.backend.save(&self.to_map()) {
            let warning = PersistenceWarning::Save {
                location: self.backend.location(),
                message: format!("{:#}", e),
            };
            warn!("{}", warning);
            return Err(warning);
        }
        Ok(true)
    }

    /// Unread count for a conversation, never negative
    pub fn unread(&self, conversation: &Conversation) -> u64 {
        conversation
            .message_count
            .saturating_sub(self.get(&conversation.contact_id))
    }

    /// Copy of the current watermarks in persisted form
    pub fn to_map(&self) -> WatermarkMap {
        self.watermarks
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), *v))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.watermarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watermarks.is_empty()
    }
}
