use crate::compose::{ComposeReadiness, SessionId};
use std::collections::HashMap;
use std::sync::Mutex;

/// Processing state of a compose session. `Unseen` is represented by
/// absence from the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Processing,
    Done,
}

/// Ensures each compose session is evaluated exactly once, at the point
/// where the compose window has finished loading.
///
/// Reentrancy across interleaved sessions is prevented here structurally,
/// not with locks around the processing itself: a session id is claimed
/// before any suspension point and never claimed again.
#[derive(Default)]
pub struct ComposeGate {
    sessions: Mutex<HashMap<SessionId, SessionState>>,
}

impl ComposeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a session for processing. Returns false when the window is not
    /// ready yet or the session was already claimed.
    pub fn try_begin(&self, session: SessionId, readiness: ComposeReadiness) -> bool {
        if !readiness.is_ready() {
            return false;
        }
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(&session) {
            return false;
        }
        sessions.insert(session, SessionState::Processing);
        true
    }

    /// Mark a claimed session permanently done.
    pub fn finish(&self, session: SessionId) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session, SessionState::Done);
    }

    /// Drop a session's entry once the underlying compose window closed,
    /// keeping the set bounded. Session ids are not reused by the host
    /// within a process lifetime.
    pub fn forget(&self, session: SessionId) {
        self.sessions.lock().unwrap().remove(&session);
    }

    pub fn state(&self, session: SessionId) -> Option<SessionState> {
        self.sessions.lock().unwrap().get(&session).copied()
    }
}
