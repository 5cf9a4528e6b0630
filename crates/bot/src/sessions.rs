use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rentatool_core::errors::UpstreamError;
use rentatool_core::flow::OrderState;
use rentatool_core::session::{OrderSession, SessionId};

/// Everything the orchestrator tracks for one conversation: the state tag,
/// the selection, and transient context for retry prompts.
#[derive(Clone, Debug)]
pub struct SessionSlot {
    pub state: OrderState,
    pub session: OrderSession,
    /// Why the last delivery quote failed, for the retry prompt.
    pub last_quote_error: Option<UpstreamError>,
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSlot {
    pub fn new() -> Self {
        Self {
            state: OrderState::Start,
            session: OrderSession::new(),
            last_quote_error: None,
        }
    }
}

/// Concurrent map of live conversations. Each slot carries its own async
/// mutex: holding it across a whole event (including any in-flight quote
/// call) is the "one event at a time per session" guarantee, and what keeps
/// a double-tap from racing a pending quote.
#[derive(Default)]
pub struct SessionRegistry {
    slots: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<SessionSlot>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for a session, created on first contact.
    pub fn slot(&self, id: SessionId) -> Arc<tokio::sync::Mutex<SessionSlot>> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .entry(id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(SessionSlot::new())))
            .clone()
    }

    /// Destroys a session on a terminal transition. Callers still holding the
    /// slot lock keep a valid handle until they drop it.
    pub fn remove(&self, id: SessionId) {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
