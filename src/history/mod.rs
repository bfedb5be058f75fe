//! Per-subject conversation history persistence.
//!
//! The routing core treats history as a read-at-start/append-at-end
//! resource. Last-write consistency per subject is the persistence layer's
//! responsibility; the channel transport serializes cycles per subject.

mod store;

pub use store::SqliteHistoryStore;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::state::Message;

/// Conversation history store keyed by subject identity.
pub trait HistoryStore: Send + Sync {
    /// Load the ordered history for a subject. Unknown subjects yield an
    /// empty history.
    fn load(&self, subject_identity: &str) -> Result<Vec<Message>>;

    /// Append one message to a subject's history.
    fn append(&self, subject_identity: &str, message: &Message) -> Result<()>;
}

/// In-memory history store for tests and ephemeral deployments.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    histories: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn load(&self, subject_identity: &str) -> Result<Vec<Message>> {
        let histories = self
            .histories
            .lock()
            .map_err(|e| Error::Internal(format!("history lock poisoned: {e}")))?;
        Ok(histories.get(subject_identity).cloned().unwrap_or_default())
    }

    fn append(&self, subject_identity: &str, message: &Message) -> Result<()> {
        let mut histories = self
            .histories
            .lock()
            .map_err(|e| Error::Internal(format!("history lock poisoned: {e}")))?;
        histories
            .entry(subject_identity.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }
}
