use std::collections::HashMap;

use fenrelay_core::{Position, PositionKey, SessionId};

/// Result of [`DedupTable::note_and_check`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DedupOutcome {
    pub is_duplicate: bool,
}

/// Last transmitted position key per session.
///
/// Confirmation decides whether a position is real; this table decides
/// whether it is new enough to send to the engine.
#[derive(Debug, Default)]
pub struct DedupTable {
    last_transmitted: HashMap<SessionId, PositionKey>,
}

impl DedupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare against the session's stored key and store the new key when
    /// it differs.
    pub fn note_and_check(&mut self, session_id: &SessionId, position: &Position) -> DedupOutcome {
        let key = position.key();
        if self.last_transmitted.get(session_id) == Some(&key) {
            return DedupOutcome { is_duplicate: true };
        }
        let _ = self.last_transmitted.insert(session_id.clone(), key);
        DedupOutcome {
            is_duplicate: false,
        }
    }

    pub fn last_transmitted(&self, session_id: &SessionId) -> Option<&PositionKey> {
        self.last_transmitted.get(session_id)
    }

    pub fn forget(&mut self, session_id: &SessionId) {
        let _ = self.last_transmitted.remove(session_id);
    }

    pub fn len(&self) -> usize {
        self.last_transmitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_transmitted.is_empty()
    }
}
