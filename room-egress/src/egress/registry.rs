//! Per-session active egress tracking.
//!
//! Only used when the service is configured to allow a single recording per
//! session. Entries live in memory and are lost on restart.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::backend::EgressHandle;
use crate::{Error, Result};

#[derive(Debug, Clone)]
enum Slot {
    /// Start request in flight.
    Starting,
    Active(EgressHandle),
}

/// Map of session id -> in-flight or active egress.
#[derive(Debug, Default)]
pub struct ActiveEgressRegistry {
    sessions: DashMap<String, Slot>,
    /// egress id -> session id, for eviction on stop.
    by_handle: DashMap<String, String>,
}

impl ActiveEgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `session_id` for a new recording.
    ///
    /// The claim is dropped again unless [`Reservation::activate`] is called,
    /// which covers both failed starts and cancelled requests.
    pub fn reserve(&self, session_id: &str) -> Result<Reservation<'_>> {
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(entry) => {
                let egress_id = match entry.get() {
                    Slot::Starting => None,
                    Slot::Active(handle) => Some(handle.to_string()),
                };
                Err(Error::SessionActive {
                    session_id: session_id.to_string(),
                    egress_id,
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(Slot::Starting);
                Ok(Reservation {
                    registry: self,
                    session_id: session_id.to_string(),
                    committed: false,
                })
            }
        }
    }

    /// Forget the session owning `handle`, if any. Returns that session id.
    pub fn evict_handle(&self, handle: &EgressHandle) -> Option<String> {
        let (_, session_id) = self.by_handle.remove(handle.as_str())?;
        self.sessions
            .remove_if(&session_id, |_, slot| matches!(slot, Slot::Active(h) if h == handle));
        debug!(session_id = %session_id, egress_id = %handle, "Evicted active egress");
        Some(session_id)
    }

    /// Whether `session_id` is starting or recording.
    pub fn is_claimed(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Pending claim on a session; released on drop unless activated.
pub struct Reservation<'a> {
    registry: &'a ActiveEgressRegistry,
    session_id: String,
    committed: bool,
}

impl Reservation<'_> {
    /// Record the backend's handle for the reserved session.
    pub fn activate(mut self, handle: &EgressHandle) {
        self.registry
            .by_handle
            .insert(handle.to_string(), self.session_id.clone());
        self.registry
            .sessions
            .insert(self.session_id.clone(), Slot::Active(handle.clone()));
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry
                .sessions
                .remove_if(&self.session_id, |_, slot| matches!(slot, Slot::Starting));
        }
    }
}
